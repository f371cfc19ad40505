//! 核心库：把源码中的硬编码颜色/框架色板类名批量替换为设计 token
//!
//! 设计要点：
//! - 扫描（Scanner）→ 规则引擎（apply）→ audit 报告 或 fix 写回 → 摘要，单次批处理，无跨次状态。
//! - 规则表是外部数据（TOML），引擎不关心具体 token 名称；多张表按固定顺序合并。
//! - 规则按顺序累积执行：后面的规则看到前面规则替换后的文本。
//! - 纯文本正则匹配，不做任何语法解析；注释内的命中默认同样处理，规则可用 `skip_comments` 显式排除。
//! - 单文件的读/写失败只记录不中断；只有“没有任何可用根目录”才是致命错误。

mod audit;
mod config;
mod engine;
mod error;
mod findings;
mod fix;
mod options;
mod pool;
mod rules;
mod ruleset;
mod scan;
mod types;

pub use audit::{
    audit, audit_records, AuditReport, Auditor, CategoryAudit, FileMatches, FileRanking, RuleAudit,
    RuleCount, SAMPLES_PER_FILE, SAMPLES_PER_RULE, TOP_FILES_GLOBAL, TOP_FILES_PER_RULE,
};
pub use config::{
    Config, ReportConfig, BUILTIN_TABLE, DEFAULT_AUDIT_REPORT, DEFAULT_CONFIG_FILE, DEFAULT_FIX_SUMMARY,
    INLINE_TABLE,
};
pub use engine::{apply, Applied};
pub use error::{Result, SweepError};
pub use fix::{fix, fix_records, FixSummary, Fixer, ModifiedFile, TOP_MODIFIED_FILES};
pub use options::{RunStats, ScanOptions};
pub use rules::{load_rule_table, CategoryEntry, RuleEntry, RuleSpec, RuleTable};
pub use ruleset::{Category, Rule, RuleSet};
pub use scan::{read_record, Scanner};
pub use types::{FileError, FileRecord, MatchEvent, ScanEntry};
