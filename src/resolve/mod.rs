//! Embed resolution
//!
//! Turns embed pages, safelinks and file-host share links into media URLs a
//! player can open. Hosts are matched against an ordered route table and the
//! first matching route picks the strategy. Nested wrappers recurse with an
//! explicit depth that stops at [`MAX_EMBED_DEPTH`].

pub mod extract;
pub mod extractor;
pub mod hosts;
pub mod pipeline;
pub mod safelink;
pub mod token;

pub use extractor::{ExtractorError, GenericExtractor, NoExtractor, YtDlp};
pub use pipeline::{LinkResolver, Resolution};
pub use safelink::unwrap_safelink;
pub use token::{AjaxEndpoint, TokenError, TokenResolver};

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fetch::{browser_headers, browser_headers_with_referer, Fetcher, Page, USER_AGENT};
use crate::models::{Headers, ResolvedMedia};

/// Deepest embed → embed chain followed before giving up
pub const MAX_EMBED_DEPTH: u8 = 3;

/// Server name used when following a nested wrapper
pub const RECURSIVE_SERVER: &str = "Recursive";

/// How a matched host is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// URL already points at media
    DirectMedia,
    /// Played as-is by the player (YouTube)
    Passthrough,
    /// Redirect gateway in front of the real link
    Safelink,
    /// Page whose only content is an iframe to another embed
    IframeWrapper,
    /// Blogger video page backed by googlevideo
    Blogger,
    /// Player page with the source in a tag or inline script
    ScriptPlayer,
    Pixeldrain,
    Krakenfiles,
    GoogleDrive,
    /// Handed to the external extractor, `og:video` as fallback
    ExternalTool,
    /// Needs a browser; nothing can extract it
    Unsupported,
}

#[derive(Debug)]
enum Matcher {
    DirectMedia,
    Keywords {
        url: &'static [&'static str],
        server: &'static [&'static str],
    },
}

#[derive(Debug)]
struct Route {
    matcher: Matcher,
    strategy: Strategy,
}

impl Route {
    fn matches(&self, url: &str, server: &str) -> bool {
        match &self.matcher {
            Matcher::DirectMedia => extract::is_direct_media(url),
            Matcher::Keywords { url: u, server: s } => {
                u.iter().any(|k| url.contains(k)) || s.iter().any(|k| server.contains(k))
            }
        }
    }
}

const fn keywords(
    url: &'static [&'static str],
    server: &'static [&'static str],
    strategy: Strategy,
) -> Route {
    Route {
        matcher: Matcher::Keywords { url, server },
        strategy,
    }
}

/// Evaluated top to bottom; first match wins
const ROUTES: &[Route] = &[
    Route {
        matcher: Matcher::DirectMedia,
        strategy: Strategy::DirectMedia,
    },
    keywords(&["youtube.com/", "youtu.be/"], &[], Strategy::Passthrough),
    keywords(&["safelink"], &["safelink"], Strategy::Safelink),
    keywords(&["desudrive", "desustream"], &["desudrive"], Strategy::IframeWrapper),
    keywords(&["blogger.com", "googleusercontent.com"], &["blogger"], Strategy::Blogger),
    keywords(
        &["vidhide", "streamwish", "filemoon", "streamhd"],
        &["vidhide", "streamwish", "filemoon", "streamhd"],
        Strategy::ScriptPlayer,
    ),
    keywords(&["pixeldrain"], &["pixeldrain", "pdrain"], Strategy::Pixeldrain),
    keywords(&["mega.nz", "mega.co.nz"], &["mega"], Strategy::Unsupported),
    keywords(&["krakenfiles"], &["kraken"], Strategy::Krakenfiles),
    keywords(&["drive.google"], &["gdrive"], Strategy::GoogleDrive),
    keywords(&["yourupload"], &["yourupload"], Strategy::ExternalTool),
    keywords(&["dood."], &["dood"], Strategy::Unsupported),
];

/// Pick the strategy for a url/server pair
pub fn route(url: &str, server: &str) -> Option<Strategy> {
    let url = url.to_lowercase();
    let server = server.to_lowercase();
    ROUTES
        .iter()
        .find(|r| r.matches(&url, &server))
        .map(|r| r.strategy)
}

/// UA + Referer pair most media hosts check
fn playback_headers(referer: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
    headers.insert("Referer".to_string(), referer.to_string());
    headers
}

/// Media found on `page_url`, carrying that page's origin as Referer
fn media_from_page(media_url: String, page_url: &str) -> ResolvedMedia {
    match extract::origin_of(page_url) {
        Some(origin) => ResolvedMedia::with_headers(media_url, playback_headers(&origin)),
        None => ResolvedMedia::direct(media_url),
    }
}

/// Strategy-table embed resolver
pub struct EmbedResolver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn GenericExtractor>,
    max_depth: u8,
}

impl EmbedResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn GenericExtractor>) -> Self {
        Self {
            fetcher,
            extractor,
            max_depth: MAX_EMBED_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Resolve an embed or share URL. `None` means the caller should fall
    /// back to opening the original URL in a browser.
    pub async fn resolve(&self, url: &str, server: &str) -> Option<ResolvedMedia> {
        self.resolve_at(url, server, None, 0).await
    }

    /// Resolve a URL that was found inside another page
    pub async fn resolve_embedded(&self, url: &str, referer: &str) -> Option<ResolvedMedia> {
        self.resolve_at(url, RECURSIVE_SERVER, Some(referer), 0).await
    }

    fn resolve_at<'a>(
        &'a self,
        url: &'a str,
        server: &'a str,
        referer: Option<&'a str>,
        depth: u8,
    ) -> BoxFuture<'a, Option<ResolvedMedia>> {
        async move {
            if depth >= self.max_depth {
                warn!(url, depth, "embed chain too deep, giving up");
                return None;
            }

            let Some(strategy) = route(url, server) else {
                debug!(url, server, "no resolver for host");
                return None;
            };
            debug!(url, server, ?strategy, depth, "resolving embed");

            let resolved = match strategy {
                Strategy::DirectMedia => Some(match referer {
                    Some(r) => ResolvedMedia::with_headers(url, playback_headers(r)),
                    None => ResolvedMedia::direct(url),
                }),
                Strategy::Passthrough => Some(ResolvedMedia::direct(url)),
                Strategy::Safelink => {
                    let target = unwrap_safelink(self.fetcher.as_ref(), url).await?;
                    self.resolve_at(&target, RECURSIVE_SERVER, None, depth + 1).await
                }
                Strategy::IframeWrapper => self.iframe_wrapper(url, referer, depth).await,
                Strategy::Blogger => Some(self.blogger(url, referer).await),
                Strategy::ScriptPlayer => self.script_player(url, referer, depth).await,
                Strategy::Pixeldrain => hosts::pixeldrain_api_url(url).map(ResolvedMedia::direct),
                Strategy::GoogleDrive => hosts::gdrive_download_url(url).map(ResolvedMedia::direct),
                Strategy::Krakenfiles => self.krakenfiles(url).await,
                Strategy::ExternalTool => self.external_tool(url).await,
                Strategy::Unsupported => {
                    debug!(url, "host needs a browser");
                    None
                }
            };

            if resolved.is_none() {
                debug!(url, ?strategy, "resolution failed");
            }
            resolved
        }
        .boxed()
    }

    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> Option<Page> {
        let headers = match referer {
            Some(r) => browser_headers_with_referer(r),
            None => browser_headers(),
        };
        match self.fetcher.get(url, &headers).await {
            Ok(page) if page.is_success() => Some(page),
            Ok(page) => {
                debug!(url, status = page.status, "embed page returned error status");
                None
            }
            Err(e) => {
                warn!(url, error = %e, "failed to fetch embed page");
                None
            }
        }
    }

    /// Follow a URL found on `page_url`: playable media is returned directly,
    /// anything else goes one level deeper.
    async fn follow(&self, candidate: &str, page_url: &str, depth: u8) -> Option<ResolvedMedia> {
        let next = extract::absolutize(candidate, page_url)?;
        if extract::is_direct_media(&next) {
            return Some(media_from_page(next, page_url));
        }
        let origin = extract::origin_of(page_url).unwrap_or_else(|| page_url.to_string());
        self.resolve_at(&next, RECURSIVE_SERVER, Some(&origin), depth + 1)
            .await
    }

    async fn iframe_wrapper(
        &self,
        url: &str,
        referer: Option<&str>,
        depth: u8,
    ) -> Option<ResolvedMedia> {
        let page = self.fetch_page(url, referer).await?;
        let candidate = extract::iframe_src(&page.body)
            .or_else(|| extract::video_source(&page.body))?;
        self.follow(&candidate, &page.final_url, depth).await
    }

    async fn blogger(&self, url: &str, referer: Option<&str>) -> ResolvedMedia {
        let referer = referer.unwrap_or("https://www.blogger.com/");
        let headers = playback_headers(referer);

        if let Some(page) = self.fetch_page(url, Some(referer)).await {
            if let Some(media) = extract::googlevideo_url(&page.body) {
                return ResolvedMedia::with_headers(media, headers);
            }
        }
        debug!(url, "no googlevideo source, using blogger page");
        ResolvedMedia::with_headers(url, headers)
    }

    async fn script_player(
        &self,
        url: &str,
        referer: Option<&str>,
        depth: u8,
    ) -> Option<ResolvedMedia> {
        let referer = referer
            .map(str::to_string)
            .or_else(|| extract::origin_of(url));
        let page = self.fetch_page(url, referer.as_deref()).await?;

        let candidate = extract::video_source(&page.body)
            .or_else(|| extract::script_player_url(&page.body))
            .or_else(|| extract::raw_media_url(&page.body))
            .or_else(|| extract::iframe_src(&page.body))?;

        self.follow(&candidate, &page.final_url, depth).await
    }

    async fn krakenfiles(&self, url: &str) -> Option<ResolvedMedia> {
        let page = self.fetch_page(url, None).await?;
        let found = extract::video_source(&page.body)
            .and_then(|src| extract::absolutize(&src, &page.final_url))
            .or_else(|| extract::download_anchor(&page.body, "krakenfiles"))
            .or_else(|| extract::raw_media_url(&page.body))
            .or_else(|| hosts::kraken_getfile_url(url))?;
        Some(media_from_page(found, &page.final_url))
    }

    async fn external_tool(&self, url: &str) -> Option<ResolvedMedia> {
        match self.extractor.extract(url).await {
            Ok(media) => return Some(ResolvedMedia::direct(media)),
            Err(e) => debug!(url, error = %e, "extractor failed, trying og:video"),
        }

        let page = self.fetch_page(url, extract::origin_of(url).as_deref()).await?;
        let video = extract::og_video(&page.body)?;
        let video = extract::absolutize(&video, &page.final_url)?;
        Some(media_from_page(video, url))
    }
}
