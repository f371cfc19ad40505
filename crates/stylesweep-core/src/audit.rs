//! audit 模式：只读扫描，按规则/文件汇总全部命中并生成排行报告
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use tracing::{info, warn};

use crate::error::Result;
use crate::findings::collect_matches;
use crate::options::RunStats;
use crate::pool::for_each_file;
use crate::ruleset::RuleSet;
use crate::scan::{read_record, Scanner};
use crate::types::{FileError, FileRecord, MatchEvent};

/// 每条规则展示的文件数
pub const TOP_FILES_PER_RULE: usize = 20;
/// 全局文件排行展示数
pub const TOP_FILES_GLOBAL: usize = 30;
/// 每条规则的样例数，以及每个文件最多取几条
pub const SAMPLES_PER_RULE: usize = 10;
pub const SAMPLES_PER_FILE: usize = 2;

const RULE_WIDTH: usize = 80;

/// 单个文件在某条规则下的全部命中
#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub path: String,
    pub events: Vec<MatchEvent>,
}

/// 单条规则的汇总；`files` 已按命中数降序（同数按路径）排序
#[derive(Debug, Clone, Serialize)]
pub struct RuleAudit {
    pub rule_id: String,
    pub category: String,
    pub label: String,
    pub pattern: String,
    pub total_matches: usize,
    pub file_count: usize,
    pub files: Vec<FileMatches>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCount {
    pub rule_id: String,
    pub count: usize,
}

/// 全局文件排行项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRanking {
    pub path: String,
    pub total: usize,
    /// 按规则顺序
    pub breakdown: Vec<RuleCount>,
}

/// 分类汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAudit {
    pub name: String,
    pub label: String,
    pub total_matches: usize,
    pub file_count: usize,
}

/// audit 结果
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub files_scanned: usize,
    /// 至少有一处命中的文件数（去重）
    pub files_affected: usize,
    pub total_matches: usize,
    pub categories: Vec<CategoryAudit>,
    pub rules: Vec<RuleAudit>,
    /// 全部命中文件的排行（渲染时截取前 30）
    pub files: Vec<FileRanking>,
    pub errors: Vec<FileError>,
}

/// 累积器：逐文件喂入命中，最后统一排序
pub struct Auditor<'r> {
    rules: &'r RuleSet,
    /// 与 rules 下标一一对应
    per_rule: Vec<Vec<FileMatches>>,
    files_scanned: usize,
    errors: Vec<FileError>,
}

impl<'r> Auditor<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self {
            rules,
            per_rule: vec![Vec::new(); rules.len()],
            files_scanned: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_file(&mut self, record: &FileRecord) {
        let events = collect_matches(record, self.rules);
        self.record_events(&record.relative, events);
    }

    /// 已在 worker 中算好的命中直接入账
    fn record_events(&mut self, path: &str, events: Vec<MatchEvent>) {
        self.files_scanned += 1;
        // collect_matches 按规则顺序产出，这里按规则下标分组
        let mut grouped: BTreeMap<usize, Vec<MatchEvent>> = BTreeMap::new();
        for ev in events {
            if let Some(idx) = self.rules.rules().iter().position(|r| r.id == ev.rule_id) {
                grouped.entry(idx).or_default().push(ev);
            }
        }
        for (idx, events) in grouped {
            self.per_rule[idx].push(FileMatches { path: path.to_string(), events });
        }
    }

    pub fn record_error(&mut self, error: FileError) {
        self.errors.push(error);
    }

    pub fn finish(self) -> AuditReport {
        let mut rules = Vec::with_capacity(self.per_rule.len());
        let mut affected: HashSet<String> = HashSet::new();
        let mut per_file: BTreeMap<String, Vec<RuleCount>> = BTreeMap::new();

        for (rule, mut files) in self.rules.rules().iter().zip(self.per_rule) {
            files.sort_by(|a, b| b.events.len().cmp(&a.events.len()).then_with(|| a.path.cmp(&b.path)));
            for f in &files {
                affected.insert(f.path.clone());
                per_file.entry(f.path.clone()).or_default().push(RuleCount {
                    rule_id: rule.id.clone(),
                    count: f.events.len(),
                });
            }
            rules.push(RuleAudit {
                rule_id: rule.id.clone(),
                category: rule.category.clone(),
                label: rule.label().to_string(),
                pattern: rule.pattern().to_string(),
                total_matches: files.iter().map(|f| f.events.len()).sum(),
                file_count: files.len(),
                files,
            });
        }

        let categories: Vec<CategoryAudit> = self
            .rules
            .categories()
            .iter()
            .map(|c| {
                let in_cat = rules.iter().filter(|r| r.category == c.name);
                let mut paths: HashSet<&str> = HashSet::new();
                let mut total = 0;
                for r in in_cat {
                    total += r.total_matches;
                    paths.extend(r.files.iter().map(|f| f.path.as_str()));
                }
                CategoryAudit {
                    name: c.name.clone(),
                    label: c.label().to_string(),
                    total_matches: total,
                    file_count: paths.len(),
                }
            })
            .collect();

        let mut files: Vec<FileRanking> = per_file
            .into_iter()
            .map(|(path, breakdown)| FileRanking {
                total: breakdown.iter().map(|b| b.count).sum(),
                path,
                breakdown,
            })
            .collect();
        // BTreeMap 已按路径有序，稳定排序保证同数时按路径
        files.sort_by(|a, b| b.total.cmp(&a.total));

        AuditReport {
            files_scanned: self.files_scanned,
            files_affected: affected.len(),
            total_matches: rules.iter().map(|r| r.total_matches).sum(),
            categories,
            rules,
            files,
            errors: self.errors,
        }
    }
}

/// 对已读入的文件做 audit（纯内存，不触碰磁盘）
pub fn audit_records<I>(records: I, rules: &RuleSet) -> AuditReport
where
    I: IntoIterator<Item = FileRecord>,
{
    let mut auditor = Auditor::new(rules);
    for record in records {
        auditor.record_file(&record);
    }
    auditor.finish()
}

/// 扫描并 audit；读取失败的文件记入报告后跳过
pub fn audit(scanner: &Scanner, rules: &RuleSet, threads: usize) -> Result<AuditReport> {
    info!(rules = rules.len(), threads, "starting audit");
    let mut auditor = Auditor::new(rules);

    for_each_file(
        scanner,
        threads,
        |entry| match read_record(entry) {
            Ok(record) => {
                let events = collect_matches(&record, rules);
                Ok((record.relative, events))
            }
            Err(err) => Err(FileError { path: entry.relative.clone(), message: err.chain_message() }),
        },
        |outcome| {
            match outcome {
                Ok((path, events)) => auditor.record_events(&path, events),
                Err(error) => {
                    warn!(path = %error.path, error = %error.message, "skipping file");
                    auditor.record_error(error);
                }
            }
            Ok(())
        },
    )?;

    let report = auditor.finish();
    info!(
        files_scanned = report.files_scanned,
        files_affected = report.files_affected,
        total_matches = report.total_matches,
        "audit finished"
    );
    Ok(report)
}

impl AuditReport {
    pub fn stats(&self) -> RunStats {
        RunStats {
            files_scanned: self.files_scanned,
            files_affected: self.files_affected,
            total: self.total_matches,
        }
    }

    pub fn write_json(&self, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }

    /// 渲染文本报告：
    /// 摘要 → 分类计数 → 每条规则明细（前 20 文件 + 样例）→ 全局前 30 文件 → 建议 → 错误
    pub fn write_text(&self, out: &mut dyn Write, recommendations: &[String]) -> std::io::Result<()> {
        let bar = "=".repeat(RULE_WIDTH);
        let dash = "-".repeat(RULE_WIDTH);

        writeln!(out, "{bar}")?;
        writeln!(out, "STYLING AUDIT REPORT")?;
        writeln!(out, "{bar}")?;
        writeln!(out)?;

        writeln!(out, "## EXECUTIVE SUMMARY")?;
        writeln!(out, "Files Scanned: {}", self.files_scanned)?;
        writeln!(out, "Total Issues Found: {}", self.total_matches)?;
        writeln!(out, "Total Files Affected: {}", self.files_affected)?;
        if !self.errors.is_empty() {
            writeln!(out, "Files Skipped (errors): {}", self.errors.len())?;
        }
        writeln!(out)?;

        writeln!(out, "## ISSUES BY CATEGORY")?;
        writeln!(out)?;
        for c in &self.categories {
            writeln!(out, "### {}", c.label)?;
            writeln!(out, "   Issues: {} across {} files", c.total_matches, c.file_count)?;
            writeln!(out)?;
        }

        writeln!(out)?;
        writeln!(out, "{bar}")?;
        writeln!(out, "## DETAILED BREAKDOWN BY RULE")?;
        writeln!(out, "{bar}")?;
        writeln!(out)?;

        for rule in self.rules.iter().filter(|r| r.total_matches > 0) {
            writeln!(out)?;
            writeln!(out, "### {}", rule.label.to_uppercase())?;
            writeln!(out, "Rule: {} ({})", rule.rule_id, rule.category)?;
            writeln!(out, "Pattern: {}", rule.pattern)?;
            writeln!(out, "Total Issues: {}", rule.total_matches)?;
            writeln!(out, "Files Affected: {}", rule.file_count)?;
            writeln!(out)?;

            writeln!(out, "Top {TOP_FILES_PER_RULE} Files with Most Issues:")?;
            for f in rule.files.iter().take(TOP_FILES_PER_RULE) {
                writeln!(out, "  {}: {} issues", f.path, f.events.len())?;
            }
            writeln!(out)?;

            writeln!(out, "Sample Issues (first {SAMPLES_PER_RULE}):")?;
            let samples = rule
                .files
                .iter()
                .flat_map(|f| f.events.iter().take(SAMPLES_PER_FILE))
                .take(SAMPLES_PER_RULE);
            for ev in samples {
                writeln!(out, "  File: {}", ev.path)?;
                writeln!(out, "  Line {}: {}", ev.line, ev.matched)?;
                writeln!(out, "  Context: {}", ev.context)?;
                writeln!(out)?;
            }
            writeln!(out, "{dash}")?;
        }

        writeln!(out)?;
        writeln!(out, "{bar}")?;
        writeln!(out, "## FILES REQUIRING ATTENTION (Top {TOP_FILES_GLOBAL})")?;
        writeln!(out, "{bar}")?;
        writeln!(out)?;
        for (i, f) in self.files.iter().take(TOP_FILES_GLOBAL).enumerate() {
            writeln!(out, "{}. {}", i + 1, f.path)?;
            writeln!(out, "   Total Issues: {}", f.total)?;
            let cats: Vec<String> = f
                .breakdown
                .iter()
                .map(|b| {
                    let label = self
                        .rules
                        .iter()
                        .find(|r| r.rule_id == b.rule_id)
                        .map(|r| r.label.as_str())
                        .unwrap_or(b.rule_id.as_str());
                    format!("{label}: {}", b.count)
                })
                .collect();
            writeln!(out, "   Categories: {}", cats.join(", "))?;
            writeln!(out)?;
        }

        writeln!(out, "{bar}")?;
        writeln!(out, "## RECOMMENDATIONS")?;
        writeln!(out, "{bar}")?;
        writeln!(out)?;
        for (i, rec) in recommendations.iter().enumerate() {
            writeln!(out, "{}. {rec}", i + 1)?;
        }
        writeln!(out)?;

        if !self.errors.is_empty() {
            writeln!(out, "{bar}")?;
            writeln!(out, "## ERRORS")?;
            writeln!(out, "{bar}")?;
            writeln!(out)?;
            for e in &self.errors {
                writeln!(out, "  {}: {}", e.path, e.message)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
