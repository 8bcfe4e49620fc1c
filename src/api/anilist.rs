//! AniList title lookup
//!
//! AniList knows the romaji names and synonyms Indonesian sites index shows
//! by. No key needed. API docs: https://docs.anilist.co

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const SEARCH_QUERY: &str = r#"
query ($search: String) {
    Media(search: $search, type: ANIME) {
        id
        idMal
        title { romaji english native }
        synonyms
    }
}"#;

const MAL_QUERY: &str = r#"
query ($malId: Int) {
    Media(idMal: $malId, type: ANIME) {
        id
        idMal
        title { romaji english native }
        synonyms
    }
}"#;

#[derive(Error, Debug)]
pub enum AnilistError {
    #[error("No anime found")]
    NotFound,

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Names of one AniList entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeTitles {
    pub id: u64,
    pub mal_id: Option<u64>,
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
    pub synonyms: Vec<String>,
}

impl AnimeTitles {
    /// Romaji, English, native, then synonyms; empty and repeated names dropped
    pub fn all(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        let named = [&self.romaji, &self.english, &self.native];
        for t in named
            .into_iter()
            .flatten()
            .chain(self.synonyms.iter())
        {
            let t = t.trim();
            if !t.is_empty() && !titles.iter().any(|seen| seen == t) {
                titles.push(t.to_string());
            }
        }
        titles
    }
}

/// AniList GraphQL client
pub struct AnilistClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnilistClient {
    pub fn new() -> Self {
        Self::with_base_url("https://graphql.anilist.co")
    }

    /// Create a client with a custom endpoint (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn media(&self, query: &str, variables: Value) -> Result<AnimeTitles, AnilistError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("Accept", "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            // AniList answers unknown media with 404 and a GraphQL error body
            StatusCode::NOT_FOUND => return Err(AnilistError::NotFound),
            status => return Err(AnilistError::ServerError(status.as_u16())),
        }

        let body = response.text().await?;
        let parsed: GraphQlResponse = serde_json::from_str(&body)
            .map_err(|e| AnilistError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        if let Some(error) = parsed.errors.first() {
            return Err(AnilistError::GraphQl(error.message.clone()));
        }
        let media = parsed
            .data
            .and_then(|d| d.media)
            .ok_or(AnilistError::NotFound)?;
        Ok(media.into())
    }

    /// Best match for a title
    pub async fn search_anime(&self, title: &str) -> Result<AnimeTitles, AnilistError> {
        let titles = self.media(SEARCH_QUERY, json!({ "search": title })).await?;
        info!(search = title, id = titles.id, romaji = ?titles.romaji, "AniList match");
        Ok(titles)
    }

    /// Entry for a MyAnimeList id
    pub async fn by_mal_id(&self, mal_id: u64) -> Result<AnimeTitles, AnilistError> {
        let titles = self.media(MAL_QUERY, json!({ "malId": mal_id })).await?;
        debug!(mal_id, id = titles.id, "AniList entry");
        Ok(titles)
    }
}

impl Default for AnilistClient {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<MediaData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Media {
    id: u64,
    id_mal: Option<u64>,
    #[serde(default)]
    title: MediaTitle,
    #[serde(default)]
    synonyms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

impl From<Media> for AnimeTitles {
    fn from(media: Media) -> Self {
        Self {
            id: media.id,
            mal_id: media.id_mal,
            romaji: media.title.romaji,
            english: media.title.english,
            native: media.title.native,
            synonyms: media.synonyms,
        }
    }
}
