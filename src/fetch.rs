//! HTTP transport used by the resolvers
//!
//! Resolution code talks to a [`Fetcher`] instead of reqwest directly so tests
//! can swap in canned pages.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use thiserror::Error;

use crate::models::Headers;

/// Desktop browser user agent sent to embed hosts
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default per-request timeout for embed pages
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("Unreachable: {0}")]
    Unreachable(String),
}

/// Response body plus where it ended up after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, following redirects
    async fn get(&self, url: &str, headers: &Headers) -> Result<Page, FetchError>;

    /// POST an urlencoded form to `url`
    async fn post_form(
        &self,
        url: &str,
        headers: &Headers,
        form: &[(String, String)],
    ) -> Result<Page, FetchError>;
}

/// Headers a desktop browser would send for a page load
pub fn browser_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
    headers.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
    );
    headers.insert("Accept-Language".to_string(), "en-US,en;q=0.5".to_string());
    headers
}

/// Browser headers with a Referer
pub fn browser_headers_with_referer(referer: &str) -> Headers {
    let mut headers = browser_headers();
    headers.insert("Referer".to_string(), referer.to_string());
    headers
}

/// Convert our header map into reqwest's
pub fn to_header_map(headers: &Headers) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.as_str().to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn into_page(response: reqwest::Response) -> Result<Page, FetchError> {
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Page {
            final_url,
            status,
            body,
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(to_header_map(headers)?)
            .send()
            .await?;
        Self::into_page(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &Headers,
        form: &[(String, String)],
    ) -> Result<Page, FetchError> {
        let response = self
            .client
            .post(url)
            .headers(to_header_map(headers)?)
            .form(form)
            .send()
            .await?;
        Self::into_page(response).await
    }
}
