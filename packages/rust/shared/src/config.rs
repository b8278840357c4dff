//! Application configuration for corpusfetch.
//!
//! User config lives at `~/.corpusfetch/corpusfetch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "corpusfetch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".corpusfetch";

/// Identifying agent string sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    concat!("corpusfetch/", env!("CARGO_PKG_VERSION"), " (+https://github.com)");

/// Environment variable that overrides the agent string.
pub const USER_AGENT_ENV: &str = "SCRAPER_USER_AGENT";

// ---------------------------------------------------------------------------
// Config structs (matching corpusfetch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output locations and quotas.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP and politeness settings.
    #[serde(default)]
    pub fetch: FetchPolicyConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for html/, pdf/ and txt/ artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// CSV audit log path.
    #[serde(default = "default_audit_log")]
    pub audit_log: String,

    /// JSONL record stream path.
    #[serde(default = "default_records")]
    pub records: String,

    /// Maximum number of items fetched per category.
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            audit_log: default_audit_log(),
            records: default_records(),
            max_per_category: default_max_per_category(),
        }
    }
}

fn default_artifacts_dir() -> String {
    "artifacts".into()
}
fn default_audit_log() -> String {
    "results/scrape_log.csv".into()
}
fn default_records() -> String {
    "results/scraped_corpus.jsonl".into()
}
fn default_max_per_category() -> usize {
    120
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPolicyConfig {
    /// Agent string; `None` means [`DEFAULT_USER_AGENT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff in seconds, doubled per retry.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: f64,

    /// Pause after every processed item, in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Reserved; the fetch loop is sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Whether to respect robots.txt.
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,
}

impl Default for FetchPolicyConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            delay_secs: default_delay_secs(),
            concurrency: default_concurrency(),
            respect_robots_txt: true,
        }
    }
}

fn default_timeout_secs() -> u64 {
    25
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_secs() -> f64 {
    0.7
}
fn default_delay_secs() -> f64 {
    0.8
}
fn default_concurrency() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Serve repeat fetches from the local response cache.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database path; defaults to `<artifacts_dir>/http_cache.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Entries older than this are refetched.
    #[serde(default = "default_expire_after_secs")]
    pub expire_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            expire_after_secs: default_expire_after_secs(),
        }
    }
}

fn default_expire_after_secs() -> u64 {
    60 * 60 * 24 * 7
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Identifying `User-Agent` header, also used for robots.txt matching.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff between retries.
    pub backoff: Duration,
    /// Politeness delay after each processed item.
    pub delay: Duration,
    /// Reserved concurrency knob.
    pub concurrency: u32,
    /// Whether the policy gate is consulted.
    pub respect_robots_txt: bool,
    /// Response cache location, `None` disables caching.
    pub cache_path: Option<PathBuf>,
    /// Response cache freshness window.
    pub cache_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        let cache_path = config.cache.enabled.then(|| match &config.cache.path {
            Some(p) => PathBuf::from(p),
            None => Path::new(&config.defaults.artifacts_dir).join("http_cache.db"),
        });

        Self {
            user_agent: resolve_user_agent(config.fetch.user_agent.as_deref()),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            max_retries: config.fetch.max_retries,
            backoff: secs_f64(config.fetch.backoff_secs),
            delay: secs_f64(config.fetch.delay_secs),
            concurrency: config.fetch.concurrency,
            respect_robots_txt: config.fetch.respect_robots_txt,
            cache_path,
            cache_ttl: Duration::from_secs(config.cache.expire_after_secs),
        }
    }
}

/// Pick the agent string: environment, then config, then the built-in default.
pub fn resolve_user_agent(configured: Option<&str>) -> String {
    std::env::var(USER_AGENT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(String::from))
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

/// Negative or non-finite seconds clamp to zero.
pub fn secs_f64(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.corpusfetch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CorpusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.corpusfetch/corpusfetch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CorpusError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CorpusError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CorpusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CorpusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
