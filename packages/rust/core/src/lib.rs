//! Run orchestration for corpusfetch.
//!
//! This crate ties the queue loader, quota planner, crawler, extractors and
//! outcome sinks into one sequential batch run ([`pipeline::run`]).

pub mod input;
pub mod pipeline;
pub mod planner;
pub mod recorder;

pub use input::{load_candidates, read_candidates};
pub use pipeline::{ArtifactCounts, ProgressReporter, RunConfig, RunSummary, SilentProgress, run};
pub use planner::plan;
pub use recorder::{AUDIT_HEADER, OutcomeRecorder};
