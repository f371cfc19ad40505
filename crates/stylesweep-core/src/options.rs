//! 扫描选项（模块）
use std::path::PathBuf;

use crate::config::Config;

/// 扫描选项
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 基准目录：相对根目录、排除规则、报告路径都以此为准
    pub base_dir: PathBuf,
    /// 扫描根目录（相对 base_dir，或绝对路径）
    pub roots: Vec<PathBuf>,
    /// 扩展名（不带点，区分大小写）
    pub extensions: Vec<String>,
    /// 目录名，按路径分段精确匹配
    pub excluded_dirs: Vec<String>,
    /// 相对路径子串
    pub excluded_files: Vec<String>,
    /// 最大文件大小（字节）；超过则跳过
    pub max_file_size: Option<u64>,
    /// 目标分组：只处理这些相对路径（文件或目录）之下的文件
    pub targets: Option<Vec<String>>,
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), PathBuf::from("."))
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &Config, base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            roots: cfg.roots.clone(),
            extensions: cfg
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            excluded_dirs: cfg.excluded_dirs.clone(),
            excluded_files: cfg.excluded_files.clone(),
            max_file_size: cfg.max_file_size,
            targets: None,
            threads: Some(1),
        }
    }

    /// 实际使用的线程数
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// 运行统计（便于 CLI 打印）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub files_scanned: usize,
    pub files_affected: usize,
    pub total: usize,
}
