//! 编译后的规则集合（有序）
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Result, SweepError};
use crate::rules::{CategoryEntry, RuleTable};

/// 单条已编译规则，加载后不可变
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub table: String,
    pub category: String,
    pub description: Option<String>,
    pub regex: Regex,
    pub replacement: Option<String>,
    pub skip_comments: bool,
}

impl Rule {
    /// 报告中使用的展示名：有描述用描述，否则用 id
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.id)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// 分类（按首次出现的顺序保存）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// 有序规则集合：后面的规则看到前面规则替换后的内容
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    categories: Vec<Category>,
}

impl RuleSet {
    /// 按给定顺序合并多个规则表并编译
    /// - 规则 id 在整个集合内唯一
    /// - 替换文本（不含捕获组引用时）不得被自身模式命中，保证二次执行无变化
    pub fn compile(tables: Vec<RuleTable>) -> Result<Self> {
        let mut set = RuleSet::default();
        let mut seen: HashMap<String, String> = HashMap::new();

        for table in tables {
            for c in &table.categories {
                set.declare_category(c);
            }
            for spec in table.rules {
                if let Some(first) = seen.get(&spec.id) {
                    return Err(SweepError::DuplicateRule {
                        id: spec.id,
                        first: first.clone(),
                        second: table.name.clone(),
                    });
                }
                let regex = Regex::new(&spec.pattern).map_err(|source| SweepError::InvalidRegex {
                    id: spec.id.clone(),
                    pattern: spec.pattern.clone(),
                    source,
                })?;
                if let Some(rep) = spec.replacement.as_deref() {
                    if !rep.contains('$') && regex.is_match(rep) {
                        return Err(SweepError::SelfMatchingRule {
                            id: spec.id,
                            replacement: rep.to_string(),
                        });
                    }
                }
                set.declare_category(&CategoryEntry { name: spec.category.clone(), description: None });
                seen.insert(spec.id.clone(), table.name.clone());
                set.rules.push(Rule {
                    id: spec.id,
                    table: spec.table,
                    category: spec.category,
                    description: spec.description,
                    regex,
                    replacement: spec.replacement,
                    skip_comments: spec.skip_comments,
                });
            }
        }

        Ok(set)
    }

    fn declare_category(&mut self, entry: &CategoryEntry) {
        match self.categories.iter_mut().find(|c| c.name == entry.name) {
            Some(existing) => {
                if existing.description.is_none() {
                    existing.description = entry.description.clone();
                }
            }
            None => self.categories.push(Category {
                name: entry.name.clone(),
                description: entry.description.clone(),
            }),
        }
    }

    /// 只保留指定分类中的规则（保持原有顺序）
    pub fn restrict_to_categories(self, names: &[String]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| !self.categories.iter().any(|c| &c.name == *n)) {
            return Err(SweepError::UnknownRuleCategory(unknown.clone()));
        }
        let keep = |name: &str| names.iter().any(|n| n == name);
        Ok(Self {
            rules: self.rules.into_iter().filter(|r| keep(&r.category)).collect(),
            categories: self.categories.into_iter().filter(|c| keep(&c.name)).collect(),
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// 带替换文本、可用于 fix 的规则数
    pub fn fixable_len(&self) -> usize {
        self.rules.iter().filter(|r| r.replacement.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
