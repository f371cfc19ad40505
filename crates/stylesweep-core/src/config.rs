//! 配置文件（TOML）
//!
//! 缺省路径 `./stylesweep.toml`；文件不存在时使用内置默认值。
//! 规则表路径相对于配置文件所在目录解析。
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};
use crate::rules::{load_rule_table, CategoryEntry, RuleEntry, RuleTable};

pub const DEFAULT_CONFIG_FILE: &str = "stylesweep.toml";
pub const DEFAULT_AUDIT_REPORT: &str = "STYLING_AUDIT_REPORT.txt";
pub const DEFAULT_FIX_SUMMARY: &str = "STYLING_FIX_SUMMARY.txt";
/// 内联规则表的表名
pub const INLINE_TABLE: &str = "inline";
/// 内置规则表名；配置中没有任何规则来源时使用
pub const BUILTIN_TABLE: &str = "semantic-colors";

const BUILTIN_RULES: &str = include_str!("../../../rules/semantic-colors.toml");

const DEFAULT_ROOTS: &[&str] = &["app", "components", "lib"];
const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "css"];
const DEFAULT_EXCLUDED_DIRS: &[&str] = &["node_modules", ".next", ".git", "dist", "build", "__pycache__"];
const DEFAULT_RECOMMENDATIONS: &[&str] = &[
    "Replace hardcoded hex and rgb() colors with design-token variables (var(--...)).",
    "Replace framework palette classes with their semantic token equivalents.",
    "Keep status and feedback colors on the semantic error/success/warning/info tokens.",
    "Re-run the audit after each fix pass and review the remaining matches by hand.",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 报告输出设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub audit_path: PathBuf,
    pub fix_summary_path: PathBuf,
    /// audit 报告末尾的整改建议（静态文本）
    pub recommendations: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            audit_path: PathBuf::from(DEFAULT_AUDIT_REPORT),
            fix_summary_path: PathBuf::from(DEFAULT_FIX_SUMMARY),
            recommendations: strings(DEFAULT_RECOMMENDATIONS),
        }
    }
}

/// 顶层配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub excluded_dirs: Vec<String>,
    /// 相对路径子串匹配（不是全路径相等）
    pub excluded_files: Vec<String>,
    /// 外部规则表，按列出顺序合并
    pub rule_files: Vec<PathBuf>,
    pub max_file_size: Option<u64>,
    pub dry_run: bool,
    pub report: ReportConfig,
    /// 目标分组：名称 -> 相对路径（文件或目录）列表
    pub targets: BTreeMap<String, Vec<String>>,
    /// 内联规则表
    pub categories: Vec<CategoryEntry>,
    pub rules: Vec<RuleEntry>,
    /// 配置文件所在目录（加载时填充）
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: DEFAULT_ROOTS.iter().map(PathBuf::from).collect(),
            extensions: strings(DEFAULT_EXTENSIONS),
            excluded_dirs: strings(DEFAULT_EXCLUDED_DIRS),
            excluded_files: Vec::new(),
            rule_files: Vec::new(),
            max_file_size: None,
            dry_run: false,
            report: ReportConfig::default(),
            targets: BTreeMap::new(),
            categories: Vec::new(),
            rules: Vec::new(),
            source_dir: None,
        }
    }
}

impl Config {
    /// 读取并解析配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path).map_err(|source| SweepError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::parse(&txt, path)?;
        cfg.source_dir = path.parent().map(Path::to_path_buf);
        Ok(cfg)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| SweepError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 按合并顺序返回全部规则表：内联表 → `rule_files` → `extra`（通常来自命令行）
    /// 配置既无内联规则也无 `rule_files` 时，以内置表代替前两者
    pub fn rule_tables(&self, extra: &[PathBuf]) -> Result<Vec<RuleTable>> {
        let mut tables = Vec::new();
        if self.rules.is_empty() && self.categories.is_empty() && self.rule_files.is_empty() {
            tables.push(RuleTable::parse(BUILTIN_RULES, BUILTIN_TABLE, Path::new("<builtin>"))?);
        } else if !self.rules.is_empty() || !self.categories.is_empty() {
            tables.push(RuleTable::from_entries(
                INLINE_TABLE,
                self.categories.clone(),
                self.rules.clone(),
            )?);
        }
        for path in &self.rule_files {
            tables.push(load_rule_table(&self.resolve(path))?);
        }
        for path in extra {
            tables.push(load_rule_table(path)?);
        }
        Ok(tables)
    }

    /// 取出某个目标分组；`all` 表示不过滤
    pub fn target_group(&self, name: &str) -> Result<Option<Vec<String>>> {
        if name == "all" {
            return Ok(None);
        }
        match self.targets.get(name) {
            Some(paths) => Ok(Some(paths.clone())),
            None => {
                let mut available: Vec<&str> = vec!["all"];
                available.extend(self.targets.keys().map(String::as_str));
                Err(SweepError::UnknownCategory {
                    name: name.to_string(),
                    available: available.join(", "),
                })
            }
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.source_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::parse("", Path::new("stylesweep.toml")).unwrap();
        assert_eq!(cfg.roots, vec![PathBuf::from("app"), PathBuf::from("components"), PathBuf::from("lib")]);
        assert!(cfg.excluded_dirs.contains(&"node_modules".to_string()));
        assert_eq!(cfg.report.audit_path, PathBuf::from(DEFAULT_AUDIT_REPORT));
        assert!(!cfg.dry_run);
    }

    #[test]
    fn full_config_parses() {
        let cfg = Config::parse(
            r##"
roots = ["app"]
extensions = ["tsx"]
excluded_files = ["brandy/page.tsx"]
dry_run = true

[report]
audit_path = "out/audit.txt"

[targets]
admin = ["app/dashboard/admin"]

[[rules]]
id = "white"
literal = "#ffffff"
replacement = "var(--semantic-bg-base)"
"##,
            Path::new("stylesweep.toml"),
        )
        .unwrap();
        assert_eq!(cfg.extensions, vec!["tsx"]);
        assert_eq!(cfg.report.audit_path, PathBuf::from("out/audit.txt"));
        assert_eq!(cfg.report.fix_summary_path, PathBuf::from(DEFAULT_FIX_SUMMARY));
        assert!(cfg.dry_run);
        assert_eq!(cfg.target_group("admin").unwrap(), Some(vec!["app/dashboard/admin".to_string()]));
        assert_eq!(cfg.target_group("all").unwrap(), None);

        let tables = cfg.rule_tables(&[]).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, INLINE_TABLE);
    }

    #[test]
    fn defaults_fall_back_to_builtin_table() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("extra.toml");
        std::fs::write(&extra, "[[rules]]\nid = \"x\"\nliteral = \"bg-[#123456]\"\nreplacement = \"bg-x\"\n").unwrap();

        let tables = Config::default().rule_tables(&[extra]).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, [BUILTIN_TABLE, "extra"]);

        let rules = crate::RuleSet::compile(tables).unwrap();
        let out = crate::apply("bg-gray-100", &rules);
        assert_eq!(out.content, "bg-[var(--semantic-surface-hover)]");
    }

    #[test]
    fn unknown_target_lists_available_groups() {
        let mut cfg = Config::default();
        cfg.targets.insert("apps".into(), vec!["app/dashboard/apps".into()]);
        let err = cfg.target_group("admin").unwrap_err();
        assert_eq!(err.to_string(), "unknown target category `admin` (available: all, apps)");
    }

    #[test]
    fn rule_files_resolve_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("rules")).unwrap();
        std::fs::write(
            dir.path().join("rules/v1.toml"),
            "[[rules]]\nid = \"a\"\nliteral = \"text-gray-600\"\nreplacement = \"text-[var(--semantic-text-secondary)]\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("rules/v2.toml"),
            "[[rules]]\nid = \"b\"\nliteral = \"text-gray-100\"\nreplacement = \"text-[var(--semantic-text-inverse)]\"\n",
        )
        .unwrap();
        let cfg_path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&cfg_path, "rule_files = [\"rules/v1.toml\"]\n").unwrap();

        let cfg = Config::load(&cfg_path).unwrap();
        let tables = cfg.rule_tables(&[dir.path().join("rules/v2.toml")]).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["v1", "v2"]);
    }

    fn repo_file(rel: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(rel)
    }

    #[test]
    fn bundled_rule_tables_compile_and_converge() {
        let cfg = Config::load(&repo_file("stylesweep.example.toml")).unwrap();
        let tables = cfg.rule_tables(&[repo_file("rules/audit.toml")]).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, [INLINE_TABLE, "semantic-colors", "audit"]);

        let rules = crate::RuleSet::compile(tables).unwrap();
        assert!(rules.fixable_len() > 0);
        assert!(cfg.target_group("admin").unwrap().is_some());

        let src = r#"<div className="bg-gray-100 hover:bg-[#F5F5F5] text-gray-600" />"#;
        let once = crate::apply(src, &rules);
        assert_eq!(
            once.content,
            r#"<div className="bg-[var(--semantic-surface-hover)] hover:bg-[var(--semantic-surface-hover)] text-[var(--semantic-text-secondary)]" />"#
        );
        assert_eq!(once.total, 3);
        assert!(!crate::apply(&once.content, &rules).changed());
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let err = Config::load(Path::new("/definitely/not/here/stylesweep.toml")).unwrap_err();
        assert!(matches!(err, SweepError::ConfigRead { .. }));
    }
}
