use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use stylesweep_core::{
    audit, fix, AuditReport, Config, FixSummary, RuleSet, ScanOptions, Scanner, DEFAULT_CONFIG_FILE,
};
use tracing::{info, warn};

/// 命令行入口（基于 clap），无子命令：默认 fix，`--audit` 切换为只读审计
#[derive(Parser, Debug)]
#[command(
    name = "stylesweep",
    version,
    about = "Replace hardcoded colors and palette classes with design tokens"
)]
struct Cli {
    /// 配置文件（TOML），默认 ./stylesweep.toml，不存在时使用内置默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 基准目录（根目录、排除规则、报告路径均相对于它），默认当前目录
    #[arg(long)]
    base: Option<PathBuf>,

    /// 覆盖配置中的扫描根目录（可重复）
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// 追加规则表文件（可重复，按给定顺序合并在配置之后；相对路径以 --base 为准）
    #[arg(long = "rules", value_name = "PATH")]
    rules: Vec<PathBuf>,

    /// 只读审计：记录全部命中并生成报告，不修改任何文件
    #[arg(long)]
    audit: bool,

    /// 预演：计算并报告将要发生的变更，但不写回文件
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// 目标分组（配置中的 [targets]），"all" 表示不过滤
    #[arg(long, default_value = "all")]
    category: String,

    /// 只使用指定分类的规则（可重复）
    #[arg(long = "rule-category", value_name = "NAME")]
    rule_categories: Vec<String>,

    /// 报告/摘要输出路径，覆盖配置
    #[arg(long)]
    report: Option<PathBuf>,

    /// 报告格式
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// 线程数（"auto"=CPU 核心数；1 为串行）
    #[arg(long, default_value = "1")]
    threads: String,

    /// 最大扫描文件大小（单位字节，例如 5242880 代表 5MB）
    #[arg(long)]
    max_file_size: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    let base = match &cli.base {
        Some(b) => b.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let config = load_config(cli.config.as_deref(), &base)?;

    // 组装扫描参数：配置为底，命令行覆盖
    let mut opts = ScanOptions::from_config(&config, base.clone());
    if !cli.roots.is_empty() {
        opts.roots = cli.roots.clone();
    }
    if cli.max_file_size.is_some() {
        opts.max_file_size = cli.max_file_size;
    }
    opts.threads = parse_threads(&cli.threads)?;
    opts.targets = config.target_group(&cli.category).context("select target category")?;

    let rules = load_rules(&config, &cli, &base)?;
    let scanner = Scanner::new(&opts).context("no files to scan")?;
    info!(base = %base.display(), roots = scanner.roots().len(), category = %cli.category, "starting run");

    let threads = opts.thread_count();
    if cli.audit {
        let report = audit(&scanner, &rules, threads).context("audit failed")?;
        let path = output_path(&base, cli.report.as_deref(), &config.report.audit_path);
        write_output(&path, |out| match cli.format {
            Format::Text => Ok(report.write_text(out, &config.report.recommendations)?),
            Format::Json => Ok(report.write_json(out)?),
        })?;
        print_audit(&report, &path);
    } else {
        let dry_run = cli.dry_run || config.dry_run;
        let summary = fix(&scanner, &rules, dry_run, threads).context("fix failed")?;
        let path = output_path(&base, cli.report.as_deref(), &config.report.fix_summary_path);
        write_output(&path, |out| match cli.format {
            Format::Text => Ok(summary.write_text(out)?),
            Format::Json => Ok(summary.write_json(out)?),
        })?;
        print_fix(&summary, &path);
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志走 stderr，stdout 只留给摘要
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 显式指定的配置文件必须存在；缺省路径不存在时使用内置默认值
fn load_config(explicit: Option<&Path>, base: &Path) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path).context("load config");
    }
    let path = base.join(DEFAULT_CONFIG_FILE);
    if path.is_file() {
        Config::load(&path).context("load config")
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

/// 合并规则表并按分类过滤；`--rules` 的相对路径以基准目录为准
fn load_rules(config: &Config, cli: &Cli, base: &Path) -> Result<RuleSet> {
    let extra: Vec<PathBuf> = cli.rules.iter().map(|p| under_base(base, p)).collect();
    let tables = config.rule_tables(&extra).context("load rule tables")?;
    let mut rules = RuleSet::compile(tables).context("compile rules")?;
    if !cli.rule_categories.is_empty() {
        rules = rules
            .restrict_to_categories(&cli.rule_categories)
            .context("filter rule categories")?;
    }
    if rules.is_empty() {
        warn!("rule set is empty; nothing will match");
    } else if !cli.audit && rules.fixable_len() == 0 {
        warn!("no rule has a replacement; fix mode will not change anything");
    }
    Ok(rules)
}

/// 解析线程参数："auto" 表示自动（等于 CPU 核数）；其他为具体数值
fn parse_threads(s: &str) -> Result<Option<usize>> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Some(n)),
        _ => bail!("invalid --threads value `{s}` (expected \"auto\" or a positive integer)"),
    }
}

fn output_path(base: &Path, cli: Option<&Path>, configured: &Path) -> PathBuf {
    under_base(base, cli.unwrap_or(configured))
}

fn under_base(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// 以缓冲方式写报告文件
fn write_output<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    render(&mut out)?;
    out.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn print_audit(report: &AuditReport, path: &Path) {
    println!("Audit complete! Report saved to: {}", path.display());
    println!("Files scanned: {}", report.files_scanned);
    println!("Total issues found: {}", report.total_matches);
    println!("Total files affected: {}", report.files_affected);
    if !report.errors.is_empty() {
        println!("Files skipped due to errors: {}", report.errors.len());
    }
    let with_hits: Vec<_> = report.categories.iter().filter(|c| c.total_matches > 0).collect();
    if !with_hits.is_empty() {
        println!();
        println!("Summary by category:");
        for c in with_hits {
            println!("  {:30}: {:5} issues in {:4} files", c.label, c.total_matches, c.file_count);
        }
    }
}

fn print_fix(summary: &FixSummary, path: &Path) {
    if summary.dry_run {
        println!("Dry run complete, no files were written.");
        println!("Files that would be modified: {}", summary.files_modified);
        println!("Changes that would be applied: {}", summary.total_replacements);
    } else {
        println!("Fixes complete!");
        println!("Files modified: {}", summary.files_modified);
        println!("Total changes: {}", summary.total_replacements);
    }
    println!("Files scanned: {}", summary.files_scanned);
    if !summary.errors.is_empty() {
        println!("Files with errors: {}", summary.errors.len());
    }
    println!("Summary saved to: {}", path.display());
    if !summary.modified.is_empty() {
        println!();
        println!("Top 10 files modified:");
        for (i, m) in summary.modified.iter().take(10).enumerate() {
            println!("  {}. {}: {} changes", i + 1, m.path, m.replacements);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_parse() {
        assert_eq!(parse_threads("auto").unwrap(), None);
        assert_eq!(parse_threads("AUTO").unwrap(), None);
        assert_eq!(parse_threads("4").unwrap(), Some(4));
        assert!(parse_threads("0").is_err());
        assert!(parse_threads("many").is_err());
    }

    #[test]
    fn relative_output_paths_join_base() {
        let base = Path::new("/repo");
        assert_eq!(
            output_path(base, None, Path::new("STYLING_AUDIT_REPORT.txt")),
            PathBuf::from("/repo/STYLING_AUDIT_REPORT.txt")
        );
        assert_eq!(
            output_path(base, Some(Path::new("/tmp/out.txt")), Path::new("x.txt")),
            PathBuf::from("/tmp/out.txt")
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
