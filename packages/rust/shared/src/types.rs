//! Core domain types for the fetch-and-extract pipeline.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Row had no URL.
pub const REASON_NO_URL: &str = "no_url";
/// Domain policy disallowed the fetch.
pub const REASON_ROBOTS: &str = "robots.txt";
/// PDF response with an empty body.
pub const REASON_EMPTY_PDF: &str = "empty_pdf";
/// HTML response with a blank body.
pub const REASON_EMPTY_HTML: &str = "empty_html";
/// Fetched fine, but no extractor produced text.
pub const REASON_NO_TEXT: &str = "no_text_extracted";

// ---------------------------------------------------------------------------
// CandidateItem
// ---------------------------------------------------------------------------

/// A selected URL from the input queue. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub url: String,
    pub title: String,
    pub category: String,
    pub source_domain: String,
    pub publish_date: String,
    /// Relevance score from upstream ranking; `None` when absent or non-numeric.
    pub score: Option<f64>,
}

// ---------------------------------------------------------------------------
// ContentKind
// ---------------------------------------------------------------------------

/// Payload classification used to pick an extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Pdf,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OutcomeStatus
// ---------------------------------------------------------------------------

/// Terminal status of one processed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Text extracted and stored.
    Ok,
    /// Fetched, but no text came out.
    Warn,
    /// Not attempted: disallowed by site policy.
    Blocked,
    /// Attempted and failed.
    Error,
    /// Not attempted: malformed input.
    Skip,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Blocked => "blocked",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FetchOutcome
// ---------------------------------------------------------------------------

/// The single record written for each processed [`CandidateItem`].
///
/// Field order is the JSONL wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub url: String,
    pub title: String,
    pub publish_date: String,
    pub source_domain: String,
    pub category: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub fetched_at: DateTime<Utc>,
    pub html_path: Option<String>,
    pub pdf_path: Option<String>,
    pub txt_path: Option<String>,
    /// SHA-256 of the extracted text; serialized as `""` when absent.
    #[serde(rename = "sha256", serialize_with = "serialize_hash")]
    pub content_hash: Option<String>,
    #[serde(rename = "bytes")]
    pub byte_length: Option<u64>,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
}

impl FetchOutcome {
    /// Start an outcome for `item` with no artifacts attached.
    pub fn new(item: &CandidateItem, status: OutcomeStatus, reason: Option<String>) -> Self {
        Self {
            url: item.url.clone(),
            title: item.title.clone(),
            publish_date: item.publish_date.clone(),
            source_domain: item.source_domain.clone(),
            category: item.category.clone(),
            fetched_at: Utc::now(),
            html_path: None,
            pdf_path: None,
            txt_path: None,
            content_hash: None,
            byte_length: None,
            status,
            reason,
        }
    }

    /// Outcome for an item that failed with `reason`.
    pub fn failed(item: &CandidateItem, status: OutcomeStatus, reason: impl Into<String>) -> Self {
        Self::new(item, status, Some(reason.into()))
    }

    /// `fetched_at` in the wire format (`2024-05-01T12:00:00.123456Z`).
    pub fn fetched_at_string(&self) -> String {
        format_timestamp(&self.fetched_at)
    }
}

/// Render a path for the record stream and audit log.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

fn serialize_hash<S: Serializer>(hash: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(hash.as_deref().unwrap_or(""))
}
