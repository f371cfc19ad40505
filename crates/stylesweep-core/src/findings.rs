//! 命中收集（audit 模式，只读）
use crate::engine::after_comment_marker;
use crate::ruleset::{Rule, RuleSet};
use crate::types::{FileRecord, MatchEvent};

/// 上下文行最大字符数
pub(crate) const CONTEXT_MAX_CHARS: usize = 100;

/// 行起始偏移表，用于把字节偏移换算成行号
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    /// 1 起始行号 = 偏移之前的换行数 + 1
    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }

    /// 第 `line` 行去除首尾空白后截断
    fn context(&self, line: usize) -> String {
        let start = self.starts[line - 1];
        let end = self.starts.get(line).map(|s| s - 1).unwrap_or(self.text.len());
        self.text[start..end].trim().chars().take(CONTEXT_MAX_CHARS).collect()
    }
}

/// 对原始内容收集所有规则的命中（不做替换，规则之间互不影响）
/// 结果按规则顺序、同一规则内按出现位置排列
pub(crate) fn collect_matches(record: &FileRecord, rules: &RuleSet) -> Vec<MatchEvent> {
    let index = LineIndex::new(&record.content);
    let mut events = Vec::new();
    for rule in rules.rules() {
        collect_rule(&index, record, rule, &mut events);
    }
    events
}

fn collect_rule(index: &LineIndex<'_>, record: &FileRecord, rule: &Rule, out: &mut Vec<MatchEvent>) {
    for m in rule.regex.find_iter(&record.content) {
        if rule.skip_comments && after_comment_marker(&record.content, m.start()) {
            continue;
        }
        let line = index.line_of(m.start());
        out.push(MatchEvent {
            rule_id: rule.id.clone(),
            path: record.relative.clone(),
            line,
            matched: m.as_str().to_string(),
            context: index.context(line),
        });
    }
}
