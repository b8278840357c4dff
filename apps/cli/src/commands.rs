//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use corpusfetch_core::pipeline::{ProgressReporter, RunConfig, RunSummary};
use corpusfetch_shared::{
    AppConfig, FetchConfig, FetchOutcome, USER_AGENT_ENV, config_file_path, init_config,
    load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// corpusfetch: fetch a selected URL queue into a text corpus.
#[derive(Parser)]
#[command(
    name = "corpusfetch",
    version,
    about = "Fetch selected URLs politely and extract their text into a corpus.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.corpusfetch/corpusfetch.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch and extract every selected URL in a queue file.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`. Unset flags fall back to the config file.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Selection CSV (needs a URL column; Status == Selected rows are kept).
    #[arg(long = "in", value_name = "CSV")]
    pub input: PathBuf,

    /// Audit log CSV, rewritten every run.
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    /// JSONL record stream, appended every run.
    #[arg(long, value_name = "JSONL")]
    pub jsonl: Option<PathBuf>,

    /// Artifacts root (html/, pdf/, txt/).
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,

    /// Items kept per category, highest score first.
    #[arg(long, alias = "max_per_category")]
    pub max_per_category: Option<usize>,

    /// Reserved: items are processed sequentially.
    #[arg(long)]
    pub concurrency: Option<u32>,

    /// Skip robots.txt checks entirely.
    #[arg(long, alias = "ignore_robots")]
    pub ignore_robots: bool,

    /// Seconds to wait after each processed item.
    #[arg(long = "throttle-sec", alias = "throttle_sec", visible_alias = "delay", value_name = "SECS")]
    pub throttle_sec: Option<f64>,

    /// Identifying User-Agent string.
    #[arg(long, env = USER_AGENT_ENV)]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for transient failures.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Base retry backoff in seconds.
    #[arg(long, value_name = "SECS")]
    pub backoff: Option<f64>,

    /// Disable the HTTP response cache.
    #[arg(long)]
    pub no_cache: bool,

    /// HTTP response cache database.
    #[arg(long, value_name = "FILE")]
    pub cache_path: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "corpusfetch=info",
        1 => "corpusfetch=debug",
        _ => "corpusfetch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_deref(), args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge flags over the config file into a [`RunConfig`].
fn build_run_config(mut app: AppConfig, args: RunArgs) -> RunConfig {
    if let Some(dir) = &args.artifacts {
        app.defaults.artifacts_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(n) = args.max_per_category {
        app.defaults.max_per_category = n;
    }
    if let Some(secs) = args.timeout {
        app.fetch.timeout_secs = secs;
    }
    if let Some(n) = args.retries {
        app.fetch.max_retries = n;
    }
    if let Some(secs) = args.backoff {
        app.fetch.backoff_secs = secs;
    }
    if let Some(secs) = args.throttle_sec {
        app.fetch.delay_secs = secs;
    }
    if let Some(n) = args.concurrency {
        app.fetch.concurrency = n;
    }
    if args.ignore_robots {
        app.fetch.respect_robots_txt = false;
    }
    if let Some(path) = &args.cache_path {
        app.cache.path = Some(path.to_string_lossy().into_owned());
    }
    if args.no_cache {
        app.cache.enabled = false;
    }

    let mut fetch = FetchConfig::from(&app);
    if let Some(ua) = args.user_agent {
        fetch.user_agent = ua;
    }

    RunConfig {
        input: args.input,
        audit_log: args
            .out
            .unwrap_or_else(|| PathBuf::from(&app.defaults.audit_log)),
        records: args
            .jsonl
            .unwrap_or_else(|| PathBuf::from(&app.defaults.records)),
        artifacts_root: PathBuf::from(&app.defaults.artifacts_dir),
        max_per_category: app.defaults.max_per_category,
        fetch,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let app = resolve_config(config_path)?;
    let config = build_run_config(app, args);

    info!(
        input = %config.input.display(),
        audit_log = %config.audit_log.display(),
        records = %config.records.display(),
        artifacts = %config.artifacts_root.display(),
        user_agent = %config.fetch.user_agent,
        cache = config.fetch.cache_path.is_some(),
        "starting corpus fetch"
    );

    let reporter = CliProgress::new();
    let summary = corpusfetch_core::pipeline::run(&config, &reporter).await?;

    println!();
    println!("  Corpus fetch complete.");
    println!("  Planned:   {}", summary.planned);
    println!("  ok:        {}", summary.ok);
    println!("  warn:      {}", summary.warn);
    println!("  blocked:   {}", summary.blocked);
    println!("  error:     {}", summary.error);
    println!("  skip:      {}", summary.skip);
    println!(
        "  Artifacts: {} html, {} pdf, {} txt",
        summary.artifacts.html, summary.artifacts.pdf, summary.artifacts.txt
    );
    println!("  Log:       {}", config.audit_log.display());
    println!("  JSONL:     {}", config.records.display());
    println!("  Artifacts: {}", config.artifacts_root.display());
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    check_summary(&summary, &config.audit_log)
}

/// A run that planned items but produced no `ok` outcome exits non-zero.
fn check_summary(summary: &RunSummary, audit_log: &Path) -> Result<()> {
    if summary.planned > 0 && summary.ok == 0 {
        return Err(eyre!(
            "none of the {} planned items produced text; see {}",
            summary.planned,
            audit_log.display()
        ));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let source = match config_path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar
            .enable_steady_tick(std::time::Duration::from_millis(120));
    }

    fn item_done(&self, outcome: &FetchOutcome, _current: usize, _total: usize) {
        self.bar.set_message(format!("{} {}", outcome.status, outcome.url));
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("corpusfetch").chain(args.iter().copied()))
            .expect("valid args")
    }

    fn summary(planned: usize, ok: usize, error: usize) -> RunSummary {
        RunSummary {
            run_id: "test".into(),
            planned,
            ok,
            warn: 0,
            blocked: 0,
            error,
            skip: 0,
            artifacts: Default::default(),
            elapsed: std::time::Duration::ZERO,
        }
    }

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Command::Run(args) => args,
            Command::Config { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn run_without_any_ok_outcome_fails() {
        let log = Path::new("results/scrape_log.csv");
        let err = check_summary(&summary(3, 0, 3), log).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("none of the 3 planned items"));
        assert!(msg.contains("scrape_log.csv"));
    }

    #[test]
    fn run_with_an_ok_outcome_or_nothing_planned_succeeds() {
        let log = Path::new("results/scrape_log.csv");
        assert!(check_summary(&summary(3, 1, 2), log).is_ok());
        assert!(check_summary(&summary(0, 0, 0), log).is_ok());
    }

    #[test]
    fn run_requires_input() {
        let err = Cli::try_parse_from(["corpusfetch", "run"]);
        assert!(err.is_err());
    }

    #[test]
    fn defaults_come_from_config() {
        let args = run_args(parse(&["run", "--in", "selected.csv"]));
        let config = build_run_config(AppConfig::default(), args);

        assert_eq!(config.input, PathBuf::from("selected.csv"));
        assert_eq!(config.audit_log, PathBuf::from("results/scrape_log.csv"));
        assert_eq!(config.records, PathBuf::from("results/scraped_corpus.jsonl"));
        assert_eq!(config.artifacts_root, PathBuf::from("artifacts"));
        assert_eq!(config.max_per_category, 120);
        assert!(config.fetch.respect_robots_txt);
        assert_eq!(
            config.fetch.cache_path,
            Some(PathBuf::from("artifacts").join("http_cache.db"))
        );
    }

    #[test]
    fn flags_override_config() {
        let args = run_args(parse(&[
            "run",
            "--in",
            "q.csv",
            "--out",
            "log.csv",
            "--artifacts",
            "store",
            "--max_per_category",
            "5",
            "--ignore-robots",
            "--delay",
            "0",
            "--user-agent",
            "flagbot/1.0",
            "--retries",
            "1",
            "--no-cache",
        ]));
        let config = build_run_config(AppConfig::default(), args);

        assert_eq!(config.audit_log, PathBuf::from("log.csv"));
        assert_eq!(config.artifacts_root, PathBuf::from("store"));
        assert_eq!(config.max_per_category, 5);
        assert!(!config.fetch.respect_robots_txt);
        assert!(config.fetch.delay.is_zero());
        assert_eq!(config.fetch.user_agent, "flagbot/1.0");
        assert_eq!(config.fetch.max_retries, 1);
        assert!(config.fetch.cache_path.is_none());
    }

    #[test]
    fn cache_follows_artifacts_dir() {
        let args = run_args(parse(&["run", "--in", "q.csv", "--artifacts", "store"]));
        let config = build_run_config(AppConfig::default(), args);
        assert_eq!(
            config.fetch.cache_path,
            Some(PathBuf::from("store").join("http_cache.db"))
        );
    }
}
