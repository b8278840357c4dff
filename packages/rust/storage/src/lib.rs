//! Artifact storage and the local HTTP response cache.
//!
//! - [`ContentStore`] writes raw HTML/PDF and extracted text to hash-derived paths.
//! - [`ResponseCache`] is a libSQL database of successful responses, keyed by URL.
//!
//! Both are single-writer: the fetch loop owns them for the whole run.

mod cache;
mod content;
mod migrations;

pub use cache::{CachedResponse, ResponseCache};
pub use content::{Artifact, ContentStore, HASH_PREFIX_LEN, StoredArtifact, sha256_hex};
