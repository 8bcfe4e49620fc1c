//! Site provider as an aggregation source
//!
//! search → season match → episodes → episode match → raw links → classify.
//! Only direct-stream links are kept; tokens are resolved up front so the
//! served URL is playable. Media that needs headers is wrapped in a relay URL
//! when a relay is attached.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::matching::{match_episode, match_season, MatchConfidence};
use super::{Provider, ProviderError, StreamSource};
use crate::links::Classifier;
use crate::models::{
    AggregatedStream, ClassifiedLink, EpisodeQuery, LinkTarget, LinkTier, RelayRequest,
    ResolvedMedia,
};
use crate::resolve::TokenResolver;
use crate::stream::RelayHandle;

/// Label marker for site streams
pub const SITE_ICON: &str = "🟡";

pub struct SiteSource {
    provider: Arc<dyn Provider>,
    classifier: Classifier,
    tokens: Arc<TokenResolver>,
    relay: Option<Arc<RelayHandle>>,
    display_name: String,
}

impl SiteSource {
    pub fn new(provider: Arc<dyn Provider>, tokens: Arc<TokenResolver>) -> Self {
        let display_name = capitalize(provider.id());
        Self {
            provider,
            classifier: Classifier::default(),
            tokens,
            relay: None,
            display_name,
        }
    }

    pub fn with_relay(mut self, relay: Arc<RelayHandle>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    async fn playable_url(&self, link: &ClassifiedLink) -> Option<ResolvedMedia> {
        match &link.raw.target {
            LinkTarget::Url(url) => Some(ResolvedMedia::direct(url.clone())),
            LinkTarget::Token(token) => {
                match self.provider.resolve_special_link(token).await {
                    Ok(Some(media)) => return Some(media),
                    Ok(None) => {}
                    Err(e) => debug!(provider = %self.provider.id(), error = %e, "provider token hook failed"),
                }
                match self.tokens.resolve(token).await {
                    Ok(media) => Some(media),
                    Err(e) => {
                        warn!(provider = %self.provider.id(), error = %e, "token resolution failed");
                        None
                    }
                }
            }
        }
    }

    fn to_stream(&self, link: &ClassifiedLink, media: ResolvedMedia) -> AggregatedStream {
        let label = format!(
            "{} {} - {} {}",
            SITE_ICON, self.display_name, link.raw.server, link.raw.resolution
        );
        let description = format!("{} | {}", link.display_server, self.display_name);
        let url = match &self.relay {
            Some(relay) if media.needs_headers() => {
                relay.proxy_url(&RelayRequest::new(media.url, media.headers))
            }
            _ => media.url,
        };
        AggregatedStream::url(label, url, description)
    }
}

#[async_trait]
impl StreamSource for SiteSource {
    fn id(&self) -> &str {
        self.provider.id()
    }

    async fn streams(
        &self,
        title: &str,
        query: &EpisodeQuery,
    ) -> Result<Vec<AggregatedStream>, ProviderError> {
        if title.trim().is_empty() {
            return Ok(Vec::new());
        }
        let results = self.provider.search(title).await?;
        let Some(season) = match_season(&results, query.season) else {
            return Ok(Vec::new());
        };
        if season.confidence == MatchConfidence::Fallback {
            debug!(provider = %self.provider.id(), title = %season.anime.title, "season match is a guess");
        }

        let episodes = self.provider.list_episodes(&season.anime).await?;
        let Some(episode) = match_episode(&episodes, query.episode) else {
            return Ok(Vec::new());
        };

        let raw = self.provider.list_raw_links(episode).await?;
        let direct: Vec<ClassifiedLink> = self
            .classifier
            .classify_all(&raw)
            .into_iter()
            .filter(|l| l.tier == LinkTier::DirectStream)
            .collect();

        let mut streams = Vec::with_capacity(direct.len());
        for link in &direct {
            if let Some(media) = self.playable_url(link).await {
                streams.push(self.to_stream(link, media));
            }
        }
        Ok(streams)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
