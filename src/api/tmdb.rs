//! TMDB (The Movie Database) title lookup
//!
//! Maps an IMDb or TMDB id to the show's names so sites can be searched by
//! title. API docs: https://developer.themoviedb.org/docs

use anyhow::Result;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Alternative titles kept per show
pub const MAX_ALTERNATIVE_TITLES: usize = 5;

/// TMDB API error types
#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Rate limited (429), retries exhausted")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No TV show for external id {0}")]
    UnknownId(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Names of one show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowTitles {
    pub tmdb_id: u64,
    pub name: String,
    pub original_name: String,
    pub alternatives: Vec<String>,
}

impl ShowTitles {
    /// Every distinct non-empty title, main name first
    pub fn all(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        for t in std::iter::once(&self.name)
            .chain(std::iter::once(&self.original_name))
            .chain(self.alternatives.iter())
        {
            if !t.is_empty() && !titles.contains(t) {
                titles.push(t.clone());
            }
        }
        titles
    }
}

/// TMDB API client
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl TmdbClient {
    /// Create a new TMDB client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.themoviedb.org/3")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            max_retries: 3,
        }
    }

    /// Read tokens (JWTs) go in the Authorization header, v3 keys in the query
    fn uses_bearer(&self) -> bool {
        self.api_key.starts_with("eyJ")
    }

    /// Make an authenticated GET request with retry logic for rate limits
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut retries = 0;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .query(query);
            request = if self.uses_bearer() {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            } else {
                request.query(&[("api_key", self.api_key.as_str())])
            };

            let response = request.send().await.map_err(TmdbError::from)?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.map_err(TmdbError::from)?;
                    let parsed: T = serde_json::from_str(&body).map_err(|e| {
                        TmdbError::InvalidResponse(format!("JSON parse error: {}", e))
                    })?;
                    return Ok(parsed);
                }
                StatusCode::NOT_FOUND => {
                    return Err(TmdbError::NotFound.into());
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TmdbError::RateLimited.into());
                    }

                    // Get Retry-After header or default to exponential backoff
                    let wait_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2u64.pow(retries));

                    debug!(wait_secs, "TMDB rate limited, backing off");
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }
                status => {
                    return Err(TmdbError::ServerError(status.as_u16()).into());
                }
            }
        }
    }

    /// TMDB TV id for an IMDb id
    pub async fn find_tv_id(&self, imdb_id: &str) -> Result<u64> {
        let endpoint = format!("/find/{}", imdb_id);
        let response: FindResponse = self
            .get(&endpoint, &[("external_source", "imdb_id")])
            .await?;
        response
            .tv_results
            .first()
            .map(|r| r.id)
            .ok_or_else(|| TmdbError::UnknownId(imdb_id.to_string()).into())
    }

    /// Name, original name and up to five alternative titles of a TV show
    pub async fn tv_titles(&self, tmdb_id: u64) -> Result<ShowTitles> {
        let detail: TvResponse = self.get(&format!("/tv/{}", tmdb_id), &[]).await?;

        // Alternatives are nice to have
        let alternatives = match self
            .get::<AlternativeTitlesResponse>(&format!("/tv/{}/alternative_titles", tmdb_id), &[])
            .await
        {
            Ok(alt) => alt.into_titles(),
            Err(e) => {
                debug!(tmdb_id, error = %e, "no alternative titles");
                Vec::new()
            }
        };

        Ok(ShowTitles {
            tmdb_id,
            name: detail.name.unwrap_or_default(),
            original_name: detail.original_name.unwrap_or_default(),
            alternatives,
        })
    }

    /// Titles for an addon external id: `tt…` (IMDb) or `tmdb:…`
    pub async fn titles_for(&self, external_id: &str) -> Result<ShowTitles> {
        let tmdb_id = match external_id.strip_prefix("tmdb:") {
            Some(id) => id
                .parse()
                .map_err(|_| TmdbError::UnknownId(external_id.to_string()))?,
            None => self.find_tv_id(external_id).await?,
        };
        let titles = self.tv_titles(tmdb_id).await?;
        info!(external_id, name = %titles.name, alternatives = titles.alternatives.len(), "TMDB titles");
        Ok(titles)
    }
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TvResponse {
    name: Option<String>,
    original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlternativeTitlesResponse {
    #[serde(default)]
    results: Vec<AlternativeTitle>,
}

#[derive(Debug, Deserialize)]
struct AlternativeTitle {
    #[serde(default)]
    title: String,
}

impl AlternativeTitlesResponse {
    fn into_titles(self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        for alt in self.results {
            if !alt.title.is_empty() && !titles.contains(&alt.title) {
                titles.push(alt.title);
            }
        }
        titles.truncate(MAX_ALTERNATIVE_TITLES);
        titles
    }
}
