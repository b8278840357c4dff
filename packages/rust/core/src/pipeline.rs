//! End-to-end run: queue → plan → gate → fetch → classify → extract → store → record.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use corpusfetch_crawler::{FetchedResponse, PolicyGate, Transport, classify};
use corpusfetch_extract::extract_text;
use corpusfetch_shared::{
    CandidateItem, ContentKind, FetchConfig, FetchOutcome, OutcomeStatus, REASON_EMPTY_HTML,
    REASON_EMPTY_PDF, REASON_NO_TEXT, REASON_NO_URL, REASON_ROBOTS, Result, display_path,
};
use corpusfetch_storage::{Artifact, ContentStore, ResponseCache};

use crate::input;
use crate::planner;
use crate::recorder::OutcomeRecorder;

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Selection CSV.
    pub input: PathBuf,
    /// CSV audit log, truncated at start.
    pub audit_log: PathBuf,
    /// JSONL record stream, appended.
    pub records: PathBuf,
    /// Root of the `html/`, `pdf/` and `txt/` directories.
    pub artifacts_root: PathBuf,
    /// Per-category quota.
    pub max_per_category: usize,
    /// Network behavior.
    pub fetch: FetchConfig,
}

/// Artifact files newly written during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactCounts {
    pub html: usize,
    pub pdf: usize,
    pub txt: usize,
}

impl ArtifactCounts {
    fn add(&mut self, other: ArtifactCounts) {
        self.html += other.html;
        self.pdf += other.pdf;
        self.txt += other.txt;
    }
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier logged with every run.
    pub run_id: String,
    /// Items left after status filtering, quota and dedup.
    pub planned: usize,
    pub ok: usize,
    pub warn: usize,
    pub blocked: usize,
    pub error: usize,
    pub skip: usize,
    pub artifacts: ArtifactCounts,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(run_id: String, planned: usize) -> Self {
        Self {
            run_id,
            planned,
            ok: 0,
            warn: 0,
            blocked: 0,
            error: 0,
            skip: 0,
            artifacts: ArtifactCounts::default(),
            elapsed: Duration::ZERO,
        }
    }

    fn tally(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Ok => self.ok += 1,
            OutcomeStatus::Warn => self.warn += 1,
            OutcomeStatus::Blocked => self.blocked += 1,
            OutcomeStatus::Error => self.error += 1,
            OutcomeStatus::Skip => self.skip += 1,
        }
    }

    /// Number of outcomes recorded.
    pub fn recorded(&self) -> usize {
        self.ok + self.warn + self.blocked + self.error + self.skip
    }

}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the plan is known.
    fn start(&self, total: usize);
    /// Called after each outcome is recorded.
    fn item_done(&self, outcome: &FetchOutcome, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _total: usize) {}
    fn item_done(&self, _outcome: &FetchOutcome, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full fetch-and-extract pipeline.
///
/// Setup failures (unreadable input, unwritable outputs, client construction)
/// return `Err` before any item is processed. Per-item failures become
/// outcomes. A sink write failure aborts the run.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub async fn run(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = uuid::Uuid::now_v7().to_string();

    // --- Setup ---
    let candidates = input::load_candidates(&config.input)?;
    let loaded = candidates.len();
    let planned = planner::plan(candidates, config.max_per_category);

    let store = ContentStore::open(&config.artifacts_root)?;
    let mut recorder = OutcomeRecorder::open(&config.audit_log, &config.records)?;
    let mut worker = Worker::new(&config.fetch, store).await?;

    if config.fetch.concurrency > 1 {
        debug!(
            concurrency = config.fetch.concurrency,
            "concurrency is reserved, processing sequentially"
        );
    }

    info!(
        %run_id,
        loaded,
        planned = planned.len(),
        max_per_category = config.max_per_category,
        respect_robots = config.fetch.respect_robots_txt,
        "starting run"
    );

    // --- Process ---
    let total = planned.len();
    let mut summary = RunSummary::new(run_id, total);
    progress.start(total);

    for (i, item) in planned.iter().enumerate() {
        let (outcome, written) = worker.process(item).await;

        recorder.record(&outcome)?;
        summary.tally(outcome.status);
        summary.artifacts.add(written);
        progress.item_done(&outcome, i + 1, total);

        if outcome.status != OutcomeStatus::Skip {
            worker.pause().await;
        }
    }

    summary.elapsed = start.elapsed();
    progress.done(&summary);

    info!(
        run_id = %summary.run_id,
        ok = summary.ok,
        warn = summary.warn,
        blocked = summary.blocked,
        error = summary.error,
        skip = summary.skip,
        html = summary.artifacts.html,
        pdf = summary.artifacts.pdf,
        txt = summary.artifacts.txt,
        elapsed_ms = summary.elapsed.as_millis(),
        "run complete"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Per-item processing
// ---------------------------------------------------------------------------

/// Owns every resource touched while processing items.
struct Worker {
    transport: Transport,
    gate: Option<PolicyGate>,
    store: ContentStore,
    delay: Duration,
}

impl Worker {
    async fn new(fetch: &FetchConfig, store: ContentStore) -> Result<Self> {
        let mut transport = Transport::new(fetch)?;

        if let Some(path) = &fetch.cache_path {
            match ResponseCache::open(path, fetch.cache_ttl).await {
                Ok(cache) => {
                    match cache.purge_expired().await {
                        Ok(purged) if purged > 0 => debug!(purged, "expired cache rows removed"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "response cache purge failed"),
                    }
                    transport = transport.with_cache(cache);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "response cache unavailable, continuing without it");
                }
            }
        }

        let gate = fetch
            .respect_robots_txt
            .then(|| PolicyGate::new(transport.client().clone(), fetch.user_agent.clone()));

        Ok(Self {
            transport,
            gate,
            store,
            delay: fetch.delay,
        })
    }

    /// Politeness delay between items.
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Drive one item to its terminal outcome.
    #[instrument(skip_all, fields(url = %item.url))]
    async fn process(&mut self, item: &CandidateItem) -> (FetchOutcome, ArtifactCounts) {
        let none = ArtifactCounts::default();

        if item.url.is_empty() {
            return (
                FetchOutcome::failed(item, OutcomeStatus::Skip, REASON_NO_URL),
                none,
            );
        }

        let url = match Url::parse(&item.url) {
            Ok(u) => u,
            Err(e) => {
                debug!(error = %e, "unparseable URL");
                return (
                    FetchOutcome::failed(item, OutcomeStatus::Error, format!("request:invalid URL: {e}")),
                    none,
                );
            }
        };

        if let Some(gate) = self.gate.as_mut() {
            if !gate.is_allowed(&url).await {
                info!("disallowed by robots.txt");
                return (
                    FetchOutcome::failed(item, OutcomeStatus::Blocked, REASON_ROBOTS),
                    none,
                );
            }
        }

        let response = match self.transport.fetch(&url).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "fetch failed");
                return (
                    FetchOutcome::failed(item, OutcomeStatus::Error, format!("request:{e}")),
                    none,
                );
            }
        };

        let mut written = ArtifactCounts::default();
        match self.handle_response(item, &response, &mut written) {
            Ok(outcome) => (outcome, written),
            Err(e) => {
                warn!(error = %e, "processing failed");
                (
                    FetchOutcome::failed(item, OutcomeStatus::Error, format!("processing:{e}")),
                    written,
                )
            }
        }
    }

    /// Classify, persist and extract a fetched payload.
    fn handle_response(
        &self,
        item: &CandidateItem,
        response: &FetchedResponse,
        written: &mut ArtifactCounts,
    ) -> Result<FetchOutcome> {
        let kind = classify(response.content_type.as_deref(), &item.url);
        let body = response.body.as_slice();
        let mut outcome = FetchOutcome::new(item, OutcomeStatus::Ok, None);
        let decoded = match kind {
            ContentKind::Html => Some(response.text()),
            ContentKind::Pdf => None,
        };

        debug!(
            %kind,
            status = response.status,
            bytes = body.len(),
            from_cache = response.from_cache,
            "response classified"
        );

        match kind {
            ContentKind::Pdf => {
                if body.is_empty() {
                    return Ok(FetchOutcome::failed(item, OutcomeStatus::Error, REASON_EMPTY_PDF));
                }
                let stored = self.store.save(Artifact::Pdf(body))?;
                written.pdf += usize::from(stored.written);
                outcome.pdf_path = Some(display_path(&stored.path));
            }
            ContentKind::Html => {
                let html = decoded.as_deref().unwrap_or_default();
                if html.trim().is_empty() {
                    return Ok(FetchOutcome::failed(item, OutcomeStatus::Error, REASON_EMPTY_HTML));
                }
                let stored = self.store.save(Artifact::Html {
                    url: &item.url,
                    html,
                })?;
                written.html += usize::from(stored.written);
                outcome.html_path = Some(display_path(&stored.path));
            }
        }
        outcome.byte_length = Some(body.len() as u64);

        let payload = decoded.as_deref().map_or(body, str::as_bytes);
        let extracted = extract_text(kind, payload, &item.url);
        if extracted.is_empty() {
            info!(%kind, "no text extracted");
            outcome.status = OutcomeStatus::Warn;
            outcome.reason = Some(REASON_NO_TEXT.to_string());
            return Ok(outcome);
        }

        let stored = self.store.save(Artifact::Text(&extracted.text))?;
        written.txt += usize::from(stored.written);
        outcome.txt_path = Some(display_path(&stored.path));
        outcome.content_hash = Some(stored.sha256);

        debug!(
            extractor = extracted.extractor.unwrap_or_default(),
            chars = extracted.text.len(),
            "text stored"
        );
        Ok(outcome)
    }
}
