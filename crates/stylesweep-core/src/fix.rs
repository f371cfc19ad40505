//! fix 模式：执行规则引擎并把变更写回原文件
//!
//! - 只有内容与原文不同的文件才会写回
//! - 写回走“同目录临时文件 + rename”，沿用原文件权限；中途失败原文件保持不变
//! - dry-run 与真实执行的计数完全相同，只是不落盘
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::engine::apply;
use crate::error::{Result, SweepError};
use crate::options::RunStats;
use crate::pool::for_each_file;
use crate::ruleset::RuleSet;
use crate::scan::{read_record, Scanner};
use crate::types::{FileError, FileRecord, ScanEntry};

/// 文本摘要中列出的文件数
pub const TOP_MODIFIED_FILES: usize = 50;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFile {
    pub path: String,
    pub replacements: usize,
    pub per_rule: BTreeMap<String, usize>,
}

/// fix 结果；`modified` 按替换数降序（同数按路径）
#[derive(Debug, Clone, Serialize)]
pub struct FixSummary {
    pub dry_run: bool,
    pub files_scanned: usize,
    pub files_modified: usize,
    pub total_replacements: usize,
    pub per_rule: BTreeMap<String, usize>,
    pub modified: Vec<ModifiedFile>,
    pub errors: Vec<FileError>,
}

/// 单文件的计算结果（worker 中产出，不涉及写盘）
struct Rewrite {
    entry: ScanEntry,
    /// None 表示无变化
    content: Option<String>,
    per_rule: BTreeMap<String, usize>,
    total: usize,
}

fn rewrite(record: FileRecord, rules: &RuleSet) -> Rewrite {
    let applied = apply(&record.content, rules);
    // 规则互相抵消时（a→b 再 b→a）计数非零但内容未变，不写回
    let content = (applied.content != record.content.as_str()).then(|| applied.content.into_owned());
    Rewrite {
        entry: ScanEntry { path: record.path, relative: record.relative },
        content,
        per_rule: applied.per_rule,
        total: applied.total,
    }
}

/// 累积器：逐文件提交变更并汇总
pub struct Fixer<'r> {
    rules: &'r RuleSet,
    dry_run: bool,
    files_scanned: usize,
    modified: Vec<ModifiedFile>,
    errors: Vec<FileError>,
}

impl<'r> Fixer<'r> {
    pub fn new(rules: &'r RuleSet, dry_run: bool) -> Self {
        Self {
            rules,
            dry_run,
            files_scanned: 0,
            modified: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn fix_record(&mut self, record: FileRecord) {
        let rw = rewrite(record, self.rules);
        self.commit(rw);
    }

    fn commit(&mut self, rw: Rewrite) {
        self.files_scanned += 1;
        let Some(content) = rw.content else { return };

        if !self.dry_run {
            if let Err(err) = write_atomic(&rw.entry.path, &content) {
                let err = SweepError::Write { path: rw.entry.path.clone(), source: err };
                warn!(path = %rw.entry.relative, error = %err.chain_message(), "write failed, file left unchanged");
                self.errors.push(FileError { path: rw.entry.relative, message: err.chain_message() });
                return;
            }
        }
        debug!(path = %rw.entry.relative, replacements = rw.total, dry_run = self.dry_run, "file rewritten");
        self.modified.push(ModifiedFile {
            path: rw.entry.relative,
            replacements: rw.total,
            per_rule: rw.per_rule,
        });
    }

    pub fn record_error(&mut self, error: FileError) {
        self.errors.push(error);
    }

    pub fn finish(mut self) -> FixSummary {
        self.modified
            .sort_by(|a, b| b.replacements.cmp(&a.replacements).then_with(|| a.path.cmp(&b.path)));
        let mut per_rule: BTreeMap<String, usize> = BTreeMap::new();
        for m in &self.modified {
            for (id, n) in &m.per_rule {
                *per_rule.entry(id.clone()).or_default() += n;
            }
        }
        FixSummary {
            dry_run: self.dry_run,
            files_scanned: self.files_scanned,
            files_modified: self.modified.len(),
            total_replacements: self.modified.iter().map(|m| m.replacements).sum(),
            per_rule,
            modified: self.modified,
            errors: self.errors,
        }
    }
}

/// 对已读入的文件执行 fix
pub fn fix_records<I>(records: I, rules: &RuleSet, dry_run: bool) -> FixSummary
where
    I: IntoIterator<Item = FileRecord>,
{
    let mut fixer = Fixer::new(rules, dry_run);
    for record in records {
        fixer.fix_record(record);
    }
    fixer.finish()
}

/// 扫描并 fix；单文件的读写失败记入摘要后继续
pub fn fix(scanner: &Scanner, rules: &RuleSet, dry_run: bool, threads: usize) -> Result<FixSummary> {
    info!(rules = rules.fixable_len(), dry_run, threads, "starting fix");
    let mut fixer = Fixer::new(rules, dry_run);

    for_each_file(
        scanner,
        threads,
        |entry| match read_record(entry) {
            Ok(record) => Ok(rewrite(record, rules)),
            Err(err) => Err(FileError { path: entry.relative.clone(), message: err.chain_message() }),
        },
        |outcome| {
            match outcome {
                Ok(rw) => fixer.commit(rw),
                Err(error) => {
                    warn!(path = %error.path, error = %error.message, "skipping file");
                    fixer.record_error(error);
                }
            }
            Ok(())
        },
    )?;

    let summary = fixer.finish();
    info!(
        files_scanned = summary.files_scanned,
        files_modified = summary.files_modified,
        total_replacements = summary.total_replacements,
        dry_run,
        "fix finished"
    );
    Ok(summary)
}

/// 同目录临时文件 + rename 的整文件覆盖写
pub(crate) fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let perms = std::fs::metadata(path)?.permissions();
    // 只读文件视为写失败，不绕过
    if perms.readonly() {
        return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is read-only"));
    }
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new().prefix(".stylesweep").tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    std::fs::set_permissions(tmp.path(), perms)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl FixSummary {
    pub fn stats(&self) -> RunStats {
        RunStats {
            files_scanned: self.files_scanned,
            files_affected: self.files_modified,
            total: self.total_replacements,
        }
    }

    pub fn write_json(&self, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let bar = "=".repeat(RULE_WIDTH);

        writeln!(out, "{bar}")?;
        if self.dry_run {
            writeln!(out, "STYLING FIXES - DRY RUN SUMMARY (no files were written)")?;
        } else {
            writeln!(out, "STYLING FIXES - EXECUTION SUMMARY")?;
        }
        writeln!(out, "{bar}")?;
        writeln!(out)?;
        writeln!(out, "Files Scanned: {}", self.files_scanned)?;
        if self.dry_run {
            writeln!(out, "Files That Would Be Modified: {}", self.files_modified)?;
            writeln!(out, "Changes That Would Be Applied: {}", self.total_replacements)?;
        } else {
            writeln!(out, "Total Files Modified: {}", self.files_modified)?;
            writeln!(out, "Total Changes Applied: {}", self.total_replacements)?;
        }
        writeln!(out)?;

        if !self.per_rule.is_empty() {
            writeln!(out, "{bar}")?;
            writeln!(out, "CHANGES BY RULE")?;
            writeln!(out, "{bar}")?;
            writeln!(out)?;
            for (id, n) in &self.per_rule {
                writeln!(out, "  {id}: {n}")?;
            }
            writeln!(out)?;
        }

        if !self.modified.is_empty() {
            writeln!(out, "{bar}")?;
            writeln!(out, "FILES MODIFIED (Top {TOP_MODIFIED_FILES})")?;
            writeln!(out, "{bar}")?;
            writeln!(out)?;
            for (i, m) in self.modified.iter().take(TOP_MODIFIED_FILES).enumerate() {
                writeln!(out, "{}. {}", i + 1, m.path)?;
                writeln!(out, "   Changes: {}", m.replacements)?;
                writeln!(out)?;
            }
            if self.modified.len() > TOP_MODIFIED_FILES {
                writeln!(out, "... and {} more files", self.modified.len() - TOP_MODIFIED_FILES)?;
                writeln!(out)?;
            }
        }

        if !self.errors.is_empty() {
            writeln!(out, "{bar}")?;
            writeln!(out, "ERRORS")?;
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
