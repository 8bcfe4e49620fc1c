//! Stream aggregation and ranking
//!
//! Title variants are tried in order. For each one every source is queried
//! concurrently, each call under its own timeout and all of them under an
//! overall deadline. The first variant that yields anything wins; its streams
//! are de-duplicated by label and stably sorted by reliability.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ProviderError, StreamSource};
use crate::models::{AggregatedStream, EpisodeQuery};

/// Default per-source call timeout
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Default overall timeout for one title variant
pub const AGGREGATE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Aggregator {
    sources: Vec<Arc<dyn StreamSource>>,
    per_call_timeout: Duration,
    overall_timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn StreamSource>>) -> Self {
        Self {
            sources,
            per_call_timeout: PROVIDER_TIMEOUT,
            overall_timeout: AGGREGATE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, per_call: Duration, overall: Duration) -> Self {
        self.per_call_timeout = per_call;
        self.overall_timeout = overall;
        self
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Ranked streams for `query`. Never fails; an empty list means nothing
    /// was found in time.
    pub async fn aggregate(
        &self,
        query: &EpisodeQuery,
        title_variants: &[String],
    ) -> Vec<AggregatedStream> {
        // Sources keyed by external id still get one pass without titles
        let fallback = [String::new()];
        let variants = if title_variants.is_empty() {
            &fallback[..]
        } else {
            title_variants
        };

        for title in variants {
            debug!(title = %title, query = %query, "trying title variant");
            let streams = self.fan_out(title, query).await;
            if !streams.is_empty() {
                info!(title = %title, count = streams.len(), "found streams");
                return rank(streams);
            }
        }

        info!(query = %query, "no streams for any title variant");
        Vec::new()
    }

    async fn fan_out(&self, title: &str, query: &EpisodeQuery) -> Vec<AggregatedStream> {
        let mut set = JoinSet::new();
        for source in &self.sources {
            let source = Arc::clone(source);
            let title = title.to_string();
            let query = query.clone();
            let per_call = self.per_call_timeout;
            set.spawn(async move {
                let result = match tokio::time::timeout(per_call, source.streams(&title, &query)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                };
                (source.id().to_string(), result)
            });
        }

        let deadline = Instant::now() + self.overall_timeout;
        let mut streams = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((id, Ok(found))))) => {
                    debug!(source = %id, count = found.len(), "source finished");
                    streams.extend(found);
                }
                Ok(Some(Ok((id, Err(e))))) => {
                    warn!(source = %id, error = %e, "source failed");
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "source task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(partial = streams.len(), "aggregation timed out, using partial results");
                    break;
                }
            }
        }
        // Late sources are abandoned
        set.abort_all();
        streams
    }
}

/// Drop repeated labels (first seen wins), then stable-sort by reliability
pub fn rank(streams: Vec<AggregatedStream>) -> Vec<AggregatedStream> {
    let mut seen = HashSet::new();
    let mut unique: Vec<AggregatedStream> = streams
        .into_iter()
        .filter(|s| seen.insert(s.identity().to_string()))
        .map(|mut s| {
            s.reliability_tier = s.reliability();
            s
        })
        .collect();
    unique.sort_by_key(|s| s.reliability_tier);
    unique
}
