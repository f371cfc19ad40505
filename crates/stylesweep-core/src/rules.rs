//! 规则表加载（TOML）
//!
//! 一个规则表 = 一个 TOML 文件（或配置文件中的内联 `[[rules]]` 段）。
//! 多个规则表按给定顺序合并成 `RuleSet`，见 `ruleset.rs`。
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, SweepError};

/// 单条规则的配置（regex / pattern / literal 三选一，pattern 为 regex 的别名）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    /// 字面量，加载时转义为正则
    #[serde(default)]
    pub literal: Option<String>,
    /// 用 `\b` 包裹整个模式
    #[serde(default)]
    pub word_boundary: bool,
    /// 替换文本，可引用捕获组（`$1`、`${name}`）；缺省表示仅用于 audit
    #[serde(default)]
    pub replacement: Option<String>,
    /// 跳过同一行中位于 `//` 或 `/*` 之后的命中（标记须在行首或空白之后；不跟踪跨行注释）
    #[serde(default)]
    pub skip_comments: bool,
}

/// 分类声明（报告中按分类汇总）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 规则文件顶层结构
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// 归一化后的规则规格（尚未编译）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub id: String,
    /// 所属规则表名
    pub table: String,
    pub category: String,
    pub description: Option<String>,
    /// 最终正则源码（literal 已转义，word_boundary 已包裹）
    pub pattern: String,
    pub replacement: Option<String>,
    pub skip_comments: bool,
}

/// 一个命名规则表
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub name: String,
    pub categories: Vec<CategoryEntry>,
    pub rules: Vec<RuleSpec>,
}

impl RuleEntry {
    fn normalize(self, table: &str) -> Result<RuleSpec> {
        let raw = match (self.regex, self.pattern, self.literal) {
            (Some(r), None, None) | (None, Some(r), None) => r,
            (None, None, Some(lit)) => regex::escape(&lit),
            (None, None, None) => return Err(SweepError::MissingPattern { id: self.id }),
            _ => return Err(SweepError::ConflictingPattern { id: self.id }),
        };
        let pattern = if self.word_boundary {
            format!(r"\b(?:{raw})\b")
        } else {
            raw
        };
        Ok(RuleSpec {
            id: self.id,
            table: table.to_string(),
            // 未声明分类时归入规则表同名分类
            category: self.category.unwrap_or_else(|| table.to_string()),
            description: self.description,
            pattern,
            replacement: self.replacement,
            skip_comments: self.skip_comments,
        })
    }
}

impl RuleTable {
    /// 由已解析的条目构建规则表
    pub fn from_entries(
        name: impl Into<String>,
        categories: Vec<CategoryEntry>,
        entries: Vec<RuleEntry>,
    ) -> Result<Self> {
        let name = name.into();
        let rules = entries
            .into_iter()
            .map(|e| e.normalize(&name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name, categories, rules })
    }

    /// 解析 TOML 文本；`default_name` 在文件未写 `name` 时使用
    pub fn parse(text: &str, default_name: &str, path: &Path) -> Result<Self> {
        let parsed: RuleFile = toml::from_str(text).map_err(|source| SweepError::RuleFileParse {
            path: path.to_path_buf(),
            source,
        })?;
        let name = parsed.name.unwrap_or_else(|| default_name.to_string());
        Self::from_entries(name, parsed.categories, parsed.rules)
    }
}

/// 从 TOML 规则文件加载规则表（表名缺省为文件名去掉扩展名）
pub fn load_rule_table(path: &Path) -> Result<RuleTable> {
    let txt = std::fs::read_to_string(path).map_err(|source| SweepError::RuleFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("rules");
    RuleTable::parse(&txt, stem, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<RuleTable> {
        RuleTable::parse(text, "colors", Path::new("colors.toml"))
    }

    #[test]
    fn literal_is_escaped_and_wrapped() {
        let table = parse(
            r#"
[[rules]]
id = "gray-100"
literal = "bg-gray-100"
word_boundary = true
replacement = "bg-[var(--semantic-surface-hover)]"
"#,
        )
        .unwrap();
        assert_eq!(table.name, "colors");
        let rule = &table.rules[0];
        assert!(rule.pattern.starts_with(r"\b(?:") && rule.pattern.ends_with(r")\b"));
        let re = regex::Regex::new(&rule.pattern).unwrap();
        assert!(re.is_match("hover:bg-gray-100 p-2"));
        assert!(!re.is_match("bg-gray-1000"));
        assert_eq!(rule.category, "colors");
        assert_eq!(rule.table, "colors");
    }

    #[test]
    fn pattern_is_alias_for_regex() {
        let table = parse(
            r##"
name = "audit"

[[categories]]
name = "hex_colors"
description = "Hardcoded hex colors"

[[rules]]
id = "hex"
category = "hex_colors"
pattern = "#[0-9A-Fa-f]{6}\\b"
"##,
        )
        .unwrap();
        assert_eq!(table.name, "audit");
        assert_eq!(table.categories[0].name, "hex_colors");
        assert_eq!(table.rules[0].pattern, r"#[0-9A-Fa-f]{6}\b");
        assert_eq!(table.rules[0].replacement, None);
    }

    #[test]
    fn missing_and_conflicting_patterns_are_rejected() {
        let missing = parse("[[rules]]\nid = \"x\"\n").unwrap_err();
        assert!(matches!(missing, SweepError::MissingPattern { id } if id == "x"));

        let both = parse("[[rules]]\nid = \"y\"\nregex = \"a\"\nliteral = \"b\"\n").unwrap_err();
        assert!(matches!(both, SweepError::ConflictingPattern { id } if id == "y"));
    }

    #[test]
    fn unknown_fields_are_parse_errors() {
        let err = parse("[[rules]]\nid = \"x\"\nregex = \"a\"\nreplace = \"b\"\n").unwrap_err();
        assert!(matches!(err, SweepError::RuleFileParse { .. }));
    }

    #[test]
    fn load_uses_file_stem_as_table_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semantic-colors.toml");
        std::fs::write(&path, "[[rules]]\nid = \"a\"\nliteral = \"a\"\nreplacement = \"b\"\n").unwrap();
        let table = load_rule_table(&path).unwrap();
        assert_eq!(table.name, "semantic-colors");
        assert_eq!(table.rules.len(), 1);
    }
}
