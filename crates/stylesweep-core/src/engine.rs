//! 规则引擎：按顺序、累积地对文本执行替换
//!
//! 每条规则只执行一次，且匹配的是前面规则替换之后的“当前”文本，
//! 因此 `[("foo","bar"), ("bar","baz")]` 作用于 `"foo"` 得到 `"baz"`。
//! 引擎不理解任何语法：注释、字符串中的命中同样会被替换，
//! 除非规则自身开启 `skip_comments`。
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::ruleset::{Rule, RuleSet};

/// `apply` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<'a> {
    /// 无任何命中时为 `Cow::Borrowed`，与输入完全相同
    pub content: Cow<'a, str>,
    /// 规则 id -> 替换次数（只包含非零项）
    pub per_rule: BTreeMap<String, usize>,
    /// 恒等于 `per_rule` 之和
    pub total: usize,
}

impl Applied<'_> {
    pub fn changed(&self) -> bool {
        self.total > 0
    }
}

/// 对内容依次执行全部带替换文本的规则
pub fn apply<'a>(content: &'a str, rules: &RuleSet) -> Applied<'a> {
    let mut current: Cow<'a, str> = Cow::Borrowed(content);
    let mut per_rule = BTreeMap::new();
    let mut total = 0;

    for rule in rules.rules() {
        // 无替换文本的规则只用于 audit
        let Some(replacement) = rule.replacement.as_deref() else { continue };
        if let Some((next, count)) = apply_rule(&current, rule, replacement) {
            per_rule.insert(rule.id.clone(), count);
            total += count;
            current = Cow::Owned(next);
        }
    }

    Applied { content: current, per_rule, total }
}

/// 执行单条规则；无命中返回 None
fn apply_rule(text: &str, rule: &Rule, replacement: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut expanded = String::new();
    let mut last = 0;
    let mut count = 0;

    for caps in rule.regex.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if rule.skip_comments && after_comment_marker(text, m.start()) {
            continue;
        }
        expanded.clear();
        caps.expand(replacement, &mut expanded);
        // 展开结果与原文相同（如 `text-$1-$2`）不算一次替换
        if expanded == m.as_str() {
            continue;
        }
        if count == 0 {
            out.reserve(text.len());
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&expanded);
        last = m.end();
        count += 1;
    }

    if count == 0 {
        return None;
    }
    out.push_str(&text[last..]);
    Some((out, count))
}

/// 命中位置所在行、位于命中之前的部分是否含有 `//` 或 `/*`
/// 标记须位于行首或空白之后，`https://` 之类不算
pub(crate) fn after_comment_marker(text: &str, offset: usize) -> bool {
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &text[line_start..offset];
    ["//", "/*"].iter().any(|marker| {
        prefix
            .match_indices(*marker)
            .any(|(i, _)| prefix[..i].chars().next_back().map_or(true, char::is_whitespace))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleEntry, RuleTable};
    use crate::ruleset::tests::ruleset;

    #[test]
    fn later_rules_see_earlier_output() {
        let rules = ruleset(&[("r1", "foo", Some("bar")), ("r2", "bar", Some("baz"))]);
        let out = apply("foo", &rules);
        assert_eq!(out.content, "baz");
        assert_eq!(out.per_rule.get("r1"), Some(&1));
        assert_eq!(out.per_rule.get("r2"), Some(&1));
        assert_eq!(out.total, 2);
    }

    #[test]
    fn gray_classes_become_semantic_tokens() {
        let rules = ruleset(&[
            ("surface-hover", r"bg-gray-100", Some("bg-[var(--semantic-surface-hover)]")),
            ("text-secondary", r"text-gray-600", Some("text-[var(--semantic-text-secondary)]")),
        ]);
        let out = apply("bg-gray-100 text-gray-600", &rules);
        assert_eq!(
            out.content,
            "bg-[var(--semantic-surface-hover)] text-[var(--semantic-text-secondary)]"
        );
        assert_eq!(out.total, 2);
    }

    #[test]
    fn no_match_returns_borrowed_input() {
        let rules = ruleset(&[("r1", "foo", Some("bar"))]);
        let input = "nothing to see";
        let out = apply(input, &rules);
        assert!(matches!(out.content, Cow::Borrowed(s) if s == input));
        assert!(out.per_rule.is_empty());
        assert!(!out.changed());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let rules = ruleset(&[
            ("hex-white", r"#[fF]{6}\b", Some("var(--semantic-bg-base)")),
            ("gray", r"\btext-gray-(\d+)\b", Some("text-[var(--gray-${1})]")),
        ]);
        let first = apply("color: #FFFFFF; className=\"text-gray-500\"", &rules);
        assert_eq!(first.content, "color: var(--semantic-bg-base); className=\"text-[var(--gray-500)]\"");
        let second = apply(&first.content, &rules);
        assert_eq!(second.total, 0);
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn identity_expansion_is_not_counted() {
        let rules = ruleset(&[("same", r"text-(gray)-(\d+)", Some("text-$1-$2"))]);
        let out = apply("text-gray-500 text-gray-600", &rules);
        assert!(matches!(out.content, Cow::Borrowed(_)));
        assert_eq!(out.total, 0);
        assert!(out.per_rule.is_empty());
    }

    #[test]
    fn only_differing_expansions_are_counted() {
        let rules = ruleset(&[("pad", r"gray-(\d)(\d*)", Some("gray-${1}00"))]);
        let out = apply("gray-100 gray-5", &rules);
        assert_eq!(out.content, "gray-100 gray-500");
        assert_eq!(out.per_rule.get("pad"), Some(&1));
        assert!(!apply(&out.content, &rules).changed());
    }

    #[test]
    fn matches_inside_comments_are_replaced_by_default() {
        let rules = ruleset(&[("white", "#ffffff", Some("var(--bg)"))]);
        let out = apply("// old: #ffffff\nconst c = '#ffffff';", &rules);
        assert_eq!(out.content, "// old: var(--bg)\nconst c = 'var(--bg)';");
        assert_eq!(out.total, 2);
    }

    #[test]
    fn skip_comments_leaves_commented_matches() {
        let entries = vec![RuleEntry {
            id: "white".into(),
            literal: Some("#ffffff".into()),
            replacement: Some("var(--bg)".into()),
            skip_comments: true,
            ..RuleEntry::default()
        }];
        let rules = crate::RuleSet::compile(vec![RuleTable::from_entries("t", Vec::new(), entries).unwrap()]).unwrap();
        let out = apply("// old: #ffffff\nconst c = '#ffffff'; /* #ffffff */", &rules);
        assert_eq!(out.content, "// old: #ffffff\nconst c = 'var(--bg)'; /* #ffffff */");
        assert_eq!(out.per_rule.get("white"), Some(&1));
    }

    #[test]
    fn total_is_sum_of_per_rule_counts() {
        let rules = ruleset(&[
            ("a", r"\bbg-red-\d+\b", Some("bg-[var(--semantic-error)]")),
            ("b", r"\btext-red-\d+\b", Some("text-[var(--semantic-error)]")),
            ("audit-only", r"rgba?\([^)]+\)", None),
        ]);
        let out = apply("bg-red-50 bg-red-100 text-red-600 rgba(0, 0, 0, 0.1)", &rules);
        assert_eq!(out.total, out.per_rule.values().sum::<usize>());
        assert_eq!(out.per_rule.get("a"), Some(&2));
        assert_eq!(out.per_rule.get("audit-only"), None);
        assert!(out.content.ends_with("rgba(0, 0, 0, 0.1)"));
    }

    #[test]
    fn comment_marker_is_line_local() {
        let text = "// note\nvalue";
        assert!(!after_comment_marker(text, text.find("value").unwrap()));
        assert!(after_comment_marker("a /* b */ c", 10));
    }

    #[test]
    fn url_slashes_are_not_a_comment() {
        let line = "<a href=\"https://example.com\" className=\"bg-gray-100\" /> // bg-gray-100";
        let first = line.find("bg-gray-100").unwrap();
        let second = line.rfind("bg-gray-100").unwrap();
        assert!(!after_comment_marker(line, first));
        assert!(after_comment_marker(line, second));
        assert!(after_comment_marker("// bg-gray-100", 3));
    }
}
