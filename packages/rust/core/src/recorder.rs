//! Outcome recorder: JSONL record stream plus CSV audit log.
//!
//! The record stream is opened in append mode so runs accumulate; the audit
//! log is truncated at open and describes the latest run only. Both are
//! flushed after every record.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use corpusfetch_shared::{CorpusError, FetchOutcome, Result};

/// Audit log columns, in order.
pub const AUDIT_HEADER: [&str; 13] = [
    "URL",
    "Status",
    "Reason",
    "Category",
    "Source_Domain",
    "Title",
    "Publish_Date",
    "html_path",
    "pdf_path",
    "txt_path",
    "sha256",
    "bytes",
    "fetched_at",
];

/// Single writer for both output sinks.
pub struct OutcomeRecorder {
    records: BufWriter<File>,
    records_path: PathBuf,
    audit: csv::Writer<File>,
    audit_path: PathBuf,
}

impl OutcomeRecorder {
    /// Open both sinks, creating parent directories and the audit header.
    #[instrument(skip_all, fields(audit = %audit_path.display(), records = %records_path.display()))]
    pub fn open(audit_path: &Path, records_path: &Path) -> Result<Self> {
        ensure_parent(audit_path)?;
        ensure_parent(records_path)?;

        let audit_file = File::create(audit_path).map_err(|e| CorpusError::io(audit_path, e))?;
        let mut audit = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(audit_file);
        audit
            .write_record(AUDIT_HEADER)
            .map_err(|e| sink_error(audit_path, e))?;
        audit.flush().map_err(|e| CorpusError::io(audit_path, e))?;

        let records_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(records_path)
            .map_err(|e| CorpusError::io(records_path, e))?;

        debug!("outcome sinks opened");

        Ok(Self {
            records: BufWriter::new(records_file),
            records_path: records_path.to_path_buf(),
            audit,
            audit_path: audit_path.to_path_buf(),
        })
    }

    /// Append `outcome` to both sinks and flush.
    pub fn record(&mut self, outcome: &FetchOutcome) -> Result<()> {
        let line = serde_json::to_string(outcome).map_err(|e| {
            CorpusError::Storage(format!("failed to serialize outcome for {}: {e}", outcome.url))
        })?;
        writeln!(self.records, "{line}").map_err(|e| CorpusError::io(&self.records_path, e))?;
        self.records
            .flush()
            .map_err(|e| CorpusError::io(&self.records_path, e))?;

        self.audit
            .write_record(audit_row(outcome))
            .map_err(|e| sink_error(&self.audit_path, e))?;
        self.audit
            .flush()
            .map_err(|e| CorpusError::io(&self.audit_path, e))?;

        Ok(())
    }
}

/// One audit row; `None` becomes an empty cell.
fn audit_row(outcome: &FetchOutcome) -> [String; 13] {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        outcome.url.clone(),
        outcome.status.to_string(),
        opt(&outcome.reason),
        outcome.category.clone(),
        outcome.source_domain.clone(),
        outcome.title.clone(),
        outcome.publish_date.clone(),
        opt(&outcome.html_path),
        opt(&outcome.pdf_path),
        opt(&outcome.txt_path),
        opt(&outcome.content_hash),
        outcome
            .byte_length
            .map(|b| b.to_string())
            .unwrap_or_default(),
        outcome.fetched_at_string(),
    ]
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| CorpusError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn sink_error(path: &Path, e: csv::Error) -> CorpusError {
    CorpusError::Storage(format!("failed to write {}: {e}", path.display()))
}
