//! HTTP transport with bounded retry and an optional response cache.

use std::time::Duration;

use chrono::Utc;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response};
use tracing::{debug, instrument, warn};
use url::Url;

use corpusfetch_shared::{CorpusError, FetchConfig, Result};
use corpusfetch_storage::{CachedResponse, ResponseCache};

/// Statuses that trigger a retry.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// A response, from the network or the cache. Any status but an exhausted
/// transient one ends up here.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// URL as requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

impl FetchedResponse {
    /// Body decoded with the `Content-Type` charset, UTF-8 when absent or unknown.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decode `body` per the charset parameter of `content_type`. A BOM wins.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Why a fetch produced no usable response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Transient status still returned once retries ran out.
    #[error("HTTP {status} after {attempts} attempt(s)")]
    Status { status: u16, attempts: u32 },

    /// Connection, timeout, TLS, or body-read failure.
    #[error("{0}")]
    Request(String),
}

/// Build the shared HTTP client: fixed agent, timeout and `Accept: */*`.
pub fn build_client(config: &FetchConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(config.timeout)
        .build()
        .map_err(|e| CorpusError::Network(format!("failed to build HTTP client: {e}")))
}

/// Retrieves one URL per call, retrying transient failures.
pub struct Transport {
    client: Client,
    max_retries: u32,
    backoff: Duration,
    cache: Option<ResponseCache>,
}

impl Transport {
    /// Create a transport without a cache.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            max_retries: config.max_retries,
            backoff: config.backoff,
            cache: None,
        })
    }

    /// Serve and store responses through `cache`.
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The underlying client, shared with the policy gate.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch `url`. Never panics or raises for network conditions.
    ///
    /// Non-success statuses outside [`RETRY_STATUSES`] come back as responses;
    /// only 2xx responses are cached.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> std::result::Result<FetchedResponse, TransportError> {
        if let Some(hit) = self.cached(url).await {
            return Ok(hit);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let retries_left = attempt <= self.max_retries;

            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if RETRY_STATUSES.contains(&status) {
                        if retries_left {
                            let wait = self
                                .backoff_for(attempt)
                                .max(retry_after(response.headers()).unwrap_or_default());
                            debug!(status, attempt, wait_ms = wait.as_millis(), "transient status, retrying");
                            tokio::time::sleep(wait).await;
                            continue;
                        }
                        return Err(TransportError::Status {
                            status,
                            attempts: attempt,
                        });
                    }

                    let fetched = read_response(url, response).await?;
                    if fetched.is_success() {
                        self.store(&fetched).await;
                    } else {
                        debug!(status, "non-success status, processing body");
                    }
                    return Ok(fetched);
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && retries_left => {
                    let wait = self.backoff_for(attempt);
                    debug!(error = %e, attempt, wait_ms = wait.as_millis(), "connection failure, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(TransportError::Request(e.to_string())),
            }
        }
    }

    /// `backoff * 2^(attempt - 1)`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << shift)
    }

    async fn cached(&self, url: &Url) -> Option<FetchedResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get(url.as_str()).await {
            Ok(Some(hit)) => {
                debug!("served from response cache");
                Some(FetchedResponse {
                    url: hit.url.clone(),
                    final_url: hit.url,
                    status: hit.status,
                    content_type: hit.content_type,
                    body: hit.body,
                    from_cache: true,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "response cache lookup failed");
                None
            }
        }
    }

    async fn store(&self, fetched: &FetchedResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let entry = CachedResponse {
            url: fetched.url.clone(),
            status: fetched.status,
            content_type: fetched.content_type.clone(),
            body: fetched.body.clone(),
            fetched_at: Utc::now(),
        };
        if let Err(e) = cache.put(&entry).await {
            warn!(error = %e, "response cache write failed");
        }
    }
}

async fn read_response(
    url: &Url,
    response: Response,
) -> std::result::Result<FetchedResponse, TransportError> {
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Request(format!("body read failed: {e}")))?;

    Ok(FetchedResponse {
        url: url.to_string(),
        final_url,
        status,
        content_type,
        body: body.to_vec(),
        from_cache: false,
    })
}

/// `Retry-After` in delta-seconds form, capped.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}
