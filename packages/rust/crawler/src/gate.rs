//! Per-domain robots.txt policy gate.
//!
//! The first URL seen for a domain triggers one robots.txt fetch; the
//! resulting [`RobotsDecision`] is reused for the rest of the run. Any fetch
//! failure is cached as [`RobotsDecision::AllowAll`] and never retried.

use std::collections::HashMap;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::robots::RobotsTxt;

/// Cached permission state for one domain.
#[derive(Debug, Clone)]
pub enum RobotsDecision {
    /// Policy unreachable or absent: everything is allowed.
    AllowAll,
    /// Evaluate against the parsed rules.
    Rules(RobotsTxt),
}

impl RobotsDecision {
    fn allows(&self, user_agent: &str, path: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Rules(robots) => robots.is_allowed(user_agent, path),
        }
    }
}

/// Resolves and caches robots.txt decisions, one lookup per domain.
pub struct PolicyGate {
    client: Client,
    user_agent: String,
    cache: HashMap<String, RobotsDecision>,
}

impl PolicyGate {
    /// Create a gate with an empty cache.
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: HashMap::new(),
        }
    }

    /// Whether this gate's agent may fetch `url`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        let domain = domain_key(url);

        if !self.cache.contains_key(&domain) {
            let decision = self.resolve(url, &domain).await;
            self.cache.insert(domain.clone(), decision);
        }

        let path = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };

        self.cache
            .get(&domain)
            .is_none_or(|decision| decision.allows(&self.user_agent, &path))
    }

    /// Number of domains resolved so far.
    pub fn cached_domains(&self) -> usize {
        self.cache.len()
    }

    /// The decision cached for `url`'s domain, if resolved.
    pub fn decision_for(&self, url: &Url) -> Option<&RobotsDecision> {
        self.cache.get(&domain_key(url))
    }

    async fn resolve(&self, url: &Url, domain: &str) -> RobotsDecision {
        let robots_url = format!("{}://{domain}/robots.txt", url.scheme());

        let response = match self.client.get(&robots_url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(%robots_url, error = %e, "robots.txt unreachable, allowing all");
                return RobotsDecision::AllowAll;
            }
        };

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            info!(%robots_url, %status, "robots.txt access denied, disallowing domain");
            return RobotsDecision::Rules(RobotsTxt::disallow_all());
        }
        if !status.is_success() {
            debug!(%robots_url, %status, "no robots.txt, allowing all");
            return RobotsDecision::AllowAll;
        }

        match response.text().await {
            Ok(body) => {
                debug!(%robots_url, bytes = body.len(), "robots.txt parsed");
                RobotsDecision::Rules(RobotsTxt::parse(&body))
            }
            Err(e) => {
                debug!(%robots_url, error = %e, "robots.txt body unreadable, allowing all");
                RobotsDecision::AllowAll
            }
        }
    }
}

/// `host[:port]`, lowercased.
fn domain_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}
