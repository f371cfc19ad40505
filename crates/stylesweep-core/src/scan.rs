//! 目录扫描：惰性产出候选文件路径
//!
//! 过滤顺序：扩展名 → 排除目录（按路径分段精确匹配，命中即剪枝）
//! → 排除文件（相对路径子串匹配）→ 目标分组 → 文件大小。
//! 遍历为深度优先，同一目录内按文件名排序，保证报告可复现。
use aho_corasick::AhoCorasick;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, SweepError};
use crate::options::ScanOptions;
use crate::types::{FileRecord, ScanEntry};

pub struct Scanner {
    base_dir: PathBuf,
    roots: Vec<PathBuf>,
    extensions: HashSet<String>,
    excluded_dirs: HashSet<String>,
    excluded_files: Vec<String>,
    /// 全部排除子串构建的多模式自动机
    exclusion_matcher: Option<AhoCorasick>,
    targets: Option<Vec<String>>,
    max_file_size: Option<u64>,
}

impl Scanner {
    /// 校验根目录：不存在的根目录记录警告并跳过；一个可用根目录都没有时报错
    pub fn new(opts: &ScanOptions) -> Result<Self> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for root in &opts.roots {
            let path = opts.base_dir.join(root);
            if !path.is_dir() {
                warn!(root = %path.display(), "root directory not found, skipping");
                continue;
            }
            roots.push(path);
        }
        let roots = drop_nested_roots(roots);
        if roots.is_empty() {
            return Err(SweepError::NoUsableRoots { base: opts.base_dir.clone() });
        }

        let excluded_files: Vec<String> = opts
            .excluded_files
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let exclusion_matcher = if excluded_files.is_empty() {
            None
        } else {
            match AhoCorasick::new(&excluded_files) {
                Ok(ac) => Some(ac),
                Err(err) => {
                    // 退化为逐个 contains
                    warn!(error = %err, "failed to build exclusion matcher");
                    None
                }
            }
        };

        let targets = opts.targets.as_ref().map(|list| {
            list.iter()
                .map(|t| normalize_target(t))
                .inspect(|t| {
                    if !opts.base_dir.join(t).exists() {
                        warn!(target = %t, "target path not found");
                    }
                })
                .collect::<Vec<String>>()
        });

        Ok(Self {
            base_dir: opts.base_dir.clone(),
            roots,
            extensions: opts.extensions.iter().cloned().collect(),
            excluded_dirs: opts.excluded_dirs.iter().cloned().collect(),
            excluded_files,
            exclusion_matcher,
            targets,
            max_file_size: opts.max_file_size,
        })
    }

    /// 实际使用的根目录（已剔除缺失与嵌套的）
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// 惰性遍历全部根目录，产出通过过滤的文件
    pub fn files(&self) -> impl Iterator<Item = ScanEntry> + '_ {
        self.roots.iter().flat_map(move |root| {
            let anchor = self.anchor(root);
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(move |e| !self.prune(e))
                .filter_map(|e| match e {
                    Ok(e) => Some(e),
                    Err(err) => {
                        warn!(error = %err, "failed to read directory entry");
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .filter_map(move |e| self.accept(e, &anchor))
        })
    }

    /// 相对路径的起点：根目录在 base 之下时为 base，否则为根目录的父目录
    fn anchor(&self, root: &Path) -> PathBuf {
        if root.starts_with(&self.base_dir) {
            self.base_dir.clone()
        } else {
            root.parent().unwrap_or(root).to_path_buf()
        }
    }

    /// 根目录之下的排除目录直接剪枝，不再深入
    fn prune(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.excluded_dirs.contains(name))
    }

    fn accept(&self, entry: DirEntry, anchor: &Path) -> Option<ScanEntry> {
        let path = entry.into_path();
        let ext = path.extension().and_then(|e| e.to_str())?;
        if !self.extensions.contains(ext) {
            return None;
        }
        let relative = relative_path(anchor, &path);
        // 根目录以下的排除目录已在遍历时剪枝，根目录本身及其祖先不参与判断
        if !self.admits(&relative) {
            debug!(path = %relative, "excluded");
            return None;
        }
        if let Some(max) = self.max_file_size {
            if let Ok(md) = std::fs::metadata(&path) {
                if md.len() > max {
                    debug!(path = %relative, size = md.len(), "file too large, skipping");
                    return None;
                }
            }
        }
        Some(ScanEntry { path, relative })
    }

    /// 基于相对路径判断：排除目录分段、排除文件子串、目标分组
    pub fn is_candidate(&self, relative: &str) -> bool {
        let mut segments: Vec<&str> = relative.split('/').collect();
        segments.pop();
        if segments.iter().any(|s| self.excluded_dirs.contains(*s)) {
            return false;
        }
        self.admits(relative)
    }

    /// 排除文件子串与目标分组
    fn admits(&self, relative: &str) -> bool {
        if self.is_excluded_file(relative) {
            return false;
        }
        match &self.targets {
            Some(targets) => targets
                .iter()
                .any(|t| relative == t.as_str() || is_under(relative, t)),
            None => true,
        }
    }

    fn is_excluded_file(&self, relative: &str) -> bool {
        match &self.exclusion_matcher {
            Some(ac) => ac.is_match(relative),
            None => self.excluded_files.iter().any(|p| relative.contains(p.as_str())),
        }
    }
}

/// 读取整个文件为 UTF-8 文本；读失败或非 UTF-8 均视为解码错误
pub fn read_record(entry: &ScanEntry) -> Result<FileRecord> {
    let content = std::fs::read_to_string(&entry.path).map_err(|source| SweepError::Decode {
        path: entry.path.clone(),
        source,
    })?;
    Ok(FileRecord {
        path: entry.path.clone(),
        relative: entry.relative.clone(),
        content,
    })
}

/// 相对 base 的路径，统一为 `/` 分隔；不在 base 之下时保留原路径
pub(crate) fn relative_path(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::CurDir => None,
            other => Some(other.as_os_str().to_string_lossy().into_owned()),
        })
        .collect();
    parts.join("/")
}

fn is_under(relative: &str, dir: &str) -> bool {
    relative
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn normalize_target(t: &str) -> String {
    let t = t.replace('\\', "/");
    let t = t.trim_start_matches("./");
    t.trim_end_matches('/').to_string()
}

/// 去掉被其他根目录包含的根目录与重复项，避免同一文件被处理两次
fn drop_nested_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::new();
    for (i, root) in roots.iter().enumerate() {
        let covered = roots.iter().enumerate().any(|(j, other)| {
            if i == j {
                return false;
            }
            if root == other {
                j < i
            } else {
                root.starts_with(other)
            }
        });
        if covered {
            debug!(root = %root.display(), "root nested in another root, skipping");
        } else {
            kept.push(root.clone());
        }
    }
    kept
}
