//! Content sources and external metadata
//!
//! - `Provider`: the capability interface every site scraper implements
//! - `StreamSource`: anything the aggregator can ask for ranked streams
//! - `site`: adapter turning a `Provider` into a `StreamSource`
//! - `addon`: Stremio-compatible torrent addon source
//! - `tmdb`: title lookup for external ids
//! - `anilist`: romaji names and synonyms for a TMDB title
//! - `matching`: title variants and season/episode matching

pub mod addon;
pub mod anilist;
pub mod matching;
pub mod site;
pub mod tmdb;

pub use addon::AddonSource;
pub use anilist::AnilistClient;
pub use site::SiteSource;
pub use tmdb::TmdbClient;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::fetch::FetchError;
use crate::models::{
    AggregatedStream, AnimeRef, EpisodeQuery, EpisodeRef, IndirectToken, RawLink, ResolvedMedia,
};

/// Failure of a single provider call. Callers log it and carry on with zero
/// results.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out")]
    Timeout,
}

/// A content site: search, episodes, server links
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier, also stamped on every returned record
    fn id(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<AnimeRef>, ProviderError>;

    async fn list_episodes(&self, anime: &AnimeRef) -> Result<Vec<EpisodeRef>, ProviderError>;

    async fn list_raw_links(&self, episode: &EpisodeRef) -> Result<Vec<RawLink>, ProviderError>;

    /// Provider-specific token handling. `Ok(None)` defers to the shared
    /// token resolver.
    async fn resolve_special_link(
        &self,
        _token: &IndirectToken,
    ) -> Result<Option<ResolvedMedia>, ProviderError> {
        Ok(None)
    }
}

/// Source of ready-to-serve streams for one episode
#[async_trait]
pub trait StreamSource: Send + Sync {
    fn id(&self) -> &str;

    /// Streams for `query`, searching by `title`
    async fn streams(
        &self,
        title: &str,
        query: &EpisodeQuery,
    ) -> Result<Vec<AggregatedStream>, ProviderError>;
}

/// Search titles for an external id. TMDB gives the show's names; AniList,
/// searched with the main TMDB name, replaces them with its romaji names and
/// synonyms when it knows the show.
pub async fn search_titles(
    tmdb: &TmdbClient,
    anilist: Option<&AnilistClient>,
    external_id: &str,
) -> anyhow::Result<Vec<String>> {
    let show = tmdb.titles_for(external_id).await?;
    let Some(anilist) = anilist else {
        return Ok(show.all());
    };

    let main = if show.name.is_empty() { &show.original_name } else { &show.name };
    match anilist.search_anime(main).await {
        Ok(anime) => {
            let titles = anime.all();
            if titles.is_empty() {
                return Ok(show.all());
            }
            info!(external_id, anilist_id = anime.id, count = titles.len(), "using AniList titles");
            Ok(titles)
        }
        Err(e) => {
            warn!(external_id, error = %e, "AniList lookup failed, using TMDB titles");
            Ok(show.all())
        }
    }
}
