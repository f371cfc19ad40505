//! 公共类型（对外暴露）
use serde::Serialize;
use std::path::PathBuf;

/// 扫描器产出的候选文件（此时尚未读取内容）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// 实际路径（用于读写）
    pub path: PathBuf,
    /// 相对基准目录的路径，统一使用 `/` 分隔，用于排除规则与报告
    pub relative: String,
}

/// 一次完整读入的文件：路径 + 全量文本
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative: String,
    pub content: String,
}

/// 单个文件的可恢复错误（读取/解码/写回失败），只记录不中断批处理
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

/// 规则在某个文件中的一次命中（audit 模式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEvent {
    pub rule_id: String,
    pub path: String,
    /// 1 起始的行号
    pub line: usize,
    /// 命中的原始文本
    pub matched: String,
    /// 所在行去除首尾空白后截断到 100 个字符
    pub context: String,
}
