//! 错误类型（库层结构化错误，CLI 层再包一层 anyhow）
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read rule file: {path}")]
    RuleFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file: {path}")]
    RuleFileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("rule `{id}` has no pattern (expected one of: regex, pattern, literal)")]
    MissingPattern { id: String },

    #[error("rule `{id}` sets more than one of: regex, pattern, literal")]
    ConflictingPattern { id: String },

    #[error("invalid regex in rule `{id}`: {pattern}")]
    InvalidRegex {
        id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule `{id}` matches its own replacement `{replacement}`; a second pass would rewrite it again")]
    SelfMatchingRule { id: String, replacement: String },

    #[error("duplicate rule id `{id}` (table `{first}`, again in table `{second}`)")]
    DuplicateRule {
        id: String,
        first: String,
        second: String,
    },

    #[error("unknown rule category `{0}`")]
    UnknownRuleCategory(String),

    #[error("unknown target category `{name}` (available: {available})")]
    UnknownCategory { name: String, available: String },

    #[error("no usable root directory under {base}")]
    NoUsableRoots { base: PathBuf },

    #[error("failed to read {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// 拼接完整的 source 链，供报告中的单文件错误使用
    pub fn chain_message(&self) -> String {
        let mut msg = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            msg.push_str(": ");
            msg.push_str(&err.to_string());
            source = err.source();
        }
        msg
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
