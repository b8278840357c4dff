//! Network side of the fetch pipeline.
//!
//! This crate provides:
//! - [`robots`]: robots.txt parsing and rule evaluation
//! - [`PolicyGate`]: per-domain, run-scoped robots.txt decisions
//! - [`Transport`]: HTTP retrieval with bounded retry and an optional response cache
//! - [`classify`]: HTML vs PDF classification

pub mod classify;
pub mod gate;
pub mod robots;
pub mod transport;

pub use classify::classify;
pub use gate::{PolicyGate, RobotsDecision};
pub use robots::RobotsTxt;
pub use transport::{
    FetchedResponse, RETRY_STATUSES, Transport, TransportError, build_client, decode_body,
};
