//! Shared types, error model, and configuration for corpusfetch.
//!
//! This crate is the foundation depended on by all other corpusfetch crates.
//! It provides:
//! - [`CorpusError`]: the unified error type
//! - Domain types ([`CandidateItem`], [`FetchOutcome`], [`OutcomeStatus`], [`ContentKind`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, DEFAULT_USER_AGENT, DefaultsConfig, FetchConfig, FetchPolicyConfig,
    USER_AGENT_ENV, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_user_agent, secs_f64,
};
pub use error::{CorpusError, Result};
pub use types::{
    CandidateItem, ContentKind, FetchOutcome, OutcomeStatus, REASON_EMPTY_HTML, REASON_EMPTY_PDF,
    REASON_NO_TEXT, REASON_NO_URL, REASON_ROBOTS, display_path,
};
