//! Raw link → playable media
//!
//! Glues the token resolver and the embed resolver together so callers can
//! hand over any classified link and get back something to play or open.

use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::{route, EmbedResolver, TokenResolver};
use crate::models::{ClassifiedLink, LinkTarget, LinkTier, ResolvedMedia};

/// Outcome of resolving one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Media the player can open (possibly needing headers)
    Playable(ResolvedMedia),
    /// Nothing extractable; open this URL in a browser
    Browser(String),
    /// Token links that failed have no URL to fall back to
    Unavailable(String),
}

impl Resolution {
    pub fn media(&self) -> Option<&ResolvedMedia> {
        match self {
            Resolution::Playable(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Playable(m) => write!(f, "{}", m.url),
            Resolution::Browser(url) => write!(f, "open in browser: {}", url),
            Resolution::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

pub struct LinkResolver {
    embeds: Arc<EmbedResolver>,
    tokens: Arc<TokenResolver>,
}

impl LinkResolver {
    pub fn new(embeds: Arc<EmbedResolver>, tokens: Arc<TokenResolver>) -> Self {
        Self { embeds, tokens }
    }

    pub fn embeds(&self) -> &Arc<EmbedResolver> {
        &self.embeds
    }

    pub fn tokens(&self) -> &Arc<TokenResolver> {
        &self.tokens
    }

    /// Resolve a link target without tier information. Unknown hosts fall
    /// back to the browser.
    pub async fn resolve_target(&self, target: &LinkTarget, server: &str) -> Resolution {
        self.resolve_with_tier(target, server, LinkTier::BrowserEmbed)
            .await
    }

    /// Resolve a classified link. Direct-stream links on hosts without a
    /// strategy are handed to the player unchanged.
    pub async fn resolve_link(&self, link: &ClassifiedLink) -> Resolution {
        self.resolve_with_tier(&link.raw.target, &link.raw.server, link.tier)
            .await
    }

    async fn resolve_with_tier(&self, target: &LinkTarget, server: &str, tier: LinkTier) -> Resolution {
        match target {
            LinkTarget::Token(token) => match self.tokens.resolve(token).await {
                Ok(media) => Resolution::Playable(media),
                Err(e) => {
                    warn!(provider = %token.provider, error = %e, "token resolution failed");
                    Resolution::Unavailable(e.to_string())
                }
            },
            LinkTarget::Url(url) => {
                if route(url, server).is_none() {
                    return match tier {
                        LinkTier::DirectStream => Resolution::Playable(ResolvedMedia::direct(url.clone())),
                        _ => Resolution::Browser(url.clone()),
                    };
                }
                match self.embeds.resolve(url, server).await {
                    Some(media) => Resolution::Playable(media),
                    None => Resolution::Browser(url.clone()),
                }
            }
        }
    }
}
