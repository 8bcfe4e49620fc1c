//! Link liveness checks
//!
//! Cheap pre-flight used to hide dead servers: known-dead and trusted hosts
//! are decided without a request, everything else gets a short HEAD request.
//! Results are cached per URL.

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::TtlCache;
use crate::fetch::USER_AGENT;
use crate::models::{ClassifiedLink, LinkTarget};

/// Hosts that are shut down or always fail
pub const DEAD_HOSTS: &[&str] = &[
    "zippyshare.com",
    "racaty.net",
    "racaty.io",
    "solidfiles.com",
    "letsupload.org",
    "letsupload.io",
    "gdriveplayer.me",
    "dood.to",
    "dood.la",
    "dood.ws",
];

/// Hosts assumed reachable without checking
pub const TRUSTED_HOSTS: &[&str] = &[
    "googlevideo.com",
    "googleapis.com",
    "blogger.com",
    "storages.sokuja.id",
];

/// File lockers that answer 200 even for deleted files
pub const FILE_HOSTS: &[&str] = &["mega.nz", "drive.google", "pixeldrain.com", "krakenfiles.com"];

/// Smallest Content-Length accepted from a file host
pub const MIN_FILE_BYTES: u64 = 1000;

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Parallel checks in [`LinkVerifier::verify_batch`] and [`LinkVerifier::verify_urls`]
pub const BATCH_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Working,
    Dead,
    /// Reachable only after scraping (tokens, auth-walled pages)
    NeedsScraping,
}

impl LinkStatus {
    /// Worth showing to the user
    pub fn is_usable(&self) -> bool {
        !matches!(self, LinkStatus::Dead)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Working => write!(f, "working"),
            LinkStatus::Dead => write!(f, "dead"),
            LinkStatus::NeedsScraping => write!(f, "needs_scraping"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub status: LinkStatus,
    pub final_url: String,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl Verification {
    fn new(url: &str, status: LinkStatus) -> Self {
        Self {
            status,
            final_url: url.to_string(),
            status_code: None,
            error: None,
        }
    }

    fn dead(url: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(url, LinkStatus::Dead)
        }
    }
}

pub struct LinkVerifier {
    client: reqwest::Client,
    cache: Arc<TtlCache<String, Verification>>,
}

impl LinkVerifier {
    pub fn new(cache: Arc<TtlCache<String, Verification>>) -> Self {
        Self::with_timeout(cache, VERIFY_TIMEOUT)
    }

    pub fn with_timeout(cache: Arc<TtlCache<String, Verification>>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            cache,
        }
    }

    /// Check one URL
    pub async fn verify(&self, url: &str) -> Verification {
        if let Some(hit) = self.cache.get(&url.to_string()) {
            return hit;
        }
        let result = self.check(url).await;
        debug!(url, status = %result.status, "verified link");
        self.cache.insert(url.to_string(), result.clone());
        result
    }

    /// Check a link target; tokens can't be checked without scraping
    pub async fn verify_target(&self, target: &LinkTarget) -> Verification {
        match target {
            LinkTarget::Url(url) => self.verify(url).await,
            LinkTarget::Token(token) => {
                Verification::new(&token.to_string(), LinkStatus::NeedsScraping)
            }
        }
    }

    /// Check many links with bounded concurrency. Output order matches input.
    pub async fn verify_batch(&self, links: Vec<ClassifiedLink>) -> Vec<(ClassifiedLink, Verification)> {
        stream::iter(links)
            .map(|link| async move {
                let verification = self.verify_target(&link.raw.target).await;
                (link, verification)
            })
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await
    }

    /// Check plain URLs with bounded concurrency, in input order
    pub async fn verify_urls(&self, urls: &[String]) -> Vec<Verification> {
        stream::iter(urls)
            .map(|url| self.verify(url))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await
    }

    async fn check(&self, url: &str) -> Verification {
        let lower = url.to_lowercase();

        if let Some(host) = DEAD_HOSTS.iter().find(|h| lower.contains(*h)) {
            return Verification::dead(url, format!("Known dead host: {}", host));
        }
        if TRUSTED_HOSTS.iter().any(|h| lower.contains(h)) {
            return Verification {
                status_code: Some(200),
                ..Verification::new(url, LinkStatus::Working)
            };
        }
        if lower.starts_with("otakudesu:") || lower.starts_with("ajax:") {
            return Verification::new(url, LinkStatus::NeedsScraping);
        }

        let response = match self.client.head(url).header("Accept", "*/*").send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Verification::dead(url, "Timeout"),
            Err(e) if e.is_connect() => return Verification::dead(url, "Connection failed"),
            Err(e) if e.is_redirect() => return Verification::dead(url, "Too many redirects"),
            Err(e) => return Verification::dead(url, e.to_string()),
        };

        let status = response.status();
        let mut result = Verification {
            status_code: Some(status.as_u16()),
            final_url: response.url().to_string(),
            ..Verification::new(url, LinkStatus::Dead)
        };

        if FILE_HOSTS.iter().any(|h| lower.contains(h)) {
            let length = response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            if length > MIN_FILE_BYTES {
                result.status = LinkStatus::Working;
            } else {
                result.error = Some("No file content".to_string());
            }
            return result;
        }

        if status.is_success() || status.is_redirection() {
            result.status = LinkStatus::Working;
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            result.status = LinkStatus::NeedsScraping;
        } else {
            result.error = Some(format!("HTTP {}", status.as_u16()));
        }
        result
    }
}

/// Keep links that are working or need scraping
pub fn filter_working(verified: Vec<(ClassifiedLink, Verification)>) -> Vec<ClassifiedLink> {
    verified
        .into_iter()
        .filter(|(_, v)| v.status.is_usable())
        .map(|(link, _)| link)
        .collect()
}
