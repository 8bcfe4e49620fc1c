//! Embed Resolver Tests
//!
//! Every scenario runs against an in-memory fetcher with canned pages, so the
//! resolver's routing, recursion bound and header handling can be checked
//! without touching the network.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nimelink::cache::TtlCache;
use nimelink::fetch::{FetchError, Fetcher, Page};
use nimelink::links::Classifier;
use nimelink::models::{Headers, IndirectToken, LinkTarget, RawLink, ResolvedMedia};
use nimelink::resolve::{
    unwrap_safelink, AjaxEndpoint, EmbedResolver, LinkResolver, NoExtractor, Resolution,
    TokenResolver,
};

// =============================================================================
// Test Fetcher
// =============================================================================

#[derive(Default)]
struct MemoryFetcher {
    pages: HashMap<String, String>,
    posts: HashMap<String, String>,
    post_count: AtomicUsize,
    requests: Mutex<Vec<(String, Headers)>>,
}

impl MemoryFetcher {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn post(mut self, url: &str, body: &str) -> Self {
        self.posts.insert(url.to_string(), body.to_string());
        self
    }

    fn posts_made(&self) -> usize {
        self.post_count.load(Ordering::SeqCst)
    }

    fn headers_sent_to(&self, url: &str) -> Option<Headers> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Page, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        match self.pages.get(url) {
            Some(body) => Ok(Page {
                final_url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::Unreachable(url.to_string())),
        }
    }

    async fn post_form(
        &self,
        url: &str,
        _headers: &Headers,
        _form: &[(String, String)],
    ) -> Result<Page, FetchError> {
        self.post_count.fetch_add(1, Ordering::SeqCst);
        match self.posts.get(url) {
            Some(body) => Ok(Page {
                final_url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::Unreachable(url.to_string())),
        }
    }
}

fn embeds(fetcher: Arc<MemoryFetcher>) -> EmbedResolver {
    EmbedResolver::new(fetcher, Arc::new(NoExtractor))
}

fn referer(media: &ResolvedMedia) -> Option<&str> {
    media.headers.get("Referer").map(String::as_str)
}

fn iframe(src: &str) -> String {
    format!(r#"<html><body><iframe src="{}"></iframe></body></html>"#, src)
}

// =============================================================================
// Host Strategies
// =============================================================================

/// Test: a direct-stream server whose embed can't be fetched is unresolved
#[tokio::test]
async fn test_vidhide_unreachable_returns_none() {
    let resolver = embeds(Arc::new(MemoryFetcher::default()));
    assert_eq!(
        resolver
            .resolve("https://x.example/embed/aaa", "VidhideXYZ")
            .await,
        None
    );
}

/// Test: packed player object yields the HLS URL with the embed's origin as Referer
#[tokio::test]
async fn test_script_player_packed_object() {
    let embed = "https://vidhide.example/embed/aaa";
    let body = r#"<script>var o={"1k":"https://cdn.vh.example/hls/master.m3u8?t=1","1l":"https://cdn.vh.example/v.mp4"};jwplayer().setup(o);</script>"#;
    let fetcher = Arc::new(MemoryFetcher::default().page(embed, body));
    let resolver = embeds(Arc::clone(&fetcher));

    let media = resolver.resolve(embed, "VidhideXYZ").await.unwrap();
    assert_eq!(media.url, "https://cdn.vh.example/hls/master.m3u8?t=1");
    assert_eq!(referer(&media), Some("https://vidhide.example/"));
    assert!(media.headers.contains_key("User-Agent"));

    let sent = fetcher.headers_sent_to(embed).unwrap();
    assert_eq!(sent.get("Referer").map(String::as_str), Some("https://vidhide.example/"));
}

/// Test: jwplayer sources list is read when there is no packed object
#[tokio::test]
async fn test_script_player_sources_list() {
    let embed = "https://streamwish.example/e/zzz";
    let body = r#"<script>jwplayer("v").setup({sources: [{file: "https://cdn.sw.example/x/index.m3u8"}]});</script>"#;
    let resolver = embeds(Arc::new(MemoryFetcher::default().page(embed, body)));

    let media = resolver.resolve(embed, "Streamwish").await.unwrap();
    assert_eq!(media.url, "https://cdn.sw.example/x/index.m3u8");
}

/// Test: pixeldrain share links rewrite to the API file URL without fetching
#[tokio::test]
async fn test_pixeldrain_rewrite() {
    let resolver = embeds(Arc::new(MemoryFetcher::default()));
    let media = resolver
        .resolve("https://pixeldrain.com/u/AbC123", "Pixeldrain")
        .await
        .unwrap();
    assert_eq!(media.url, "https://pixeldrain.com/api/file/AbC123");
    assert!(!media.needs_headers());
}

/// Test: a direct media URL passes straight through
#[tokio::test]
async fn test_direct_media_passthrough() {
    let resolver = embeds(Arc::new(MemoryFetcher::default()));
    let media = resolver
        .resolve("https://cdn.example/ep01.mp4", "Mega")
        .await
        .unwrap();
    assert_eq!(media, ResolvedMedia::direct("https://cdn.example/ep01.mp4"));
}

/// Test: mega has no extractor and falls back to the browser
#[tokio::test]
async fn test_mega_is_browser_only() {
    let resolver = embeds(Arc::new(MemoryFetcher::default()));
    assert_eq!(resolver.resolve("https://mega.nz/file/abc", "Mega").await, None);
}

/// Test: without an extractor the og:video tag is used
#[tokio::test]
async fn test_external_tool_og_video_fallback() {
    let embed = "https://www.yourupload.com/embed/abc";
    let body = r#"<html><head><meta property="og:video" content="https://vidcache.example/v/abc.mp4"></head></html>"#;
    let resolver = embeds(Arc::new(MemoryFetcher::default().page(embed, body)));

    let media = resolver.resolve(embed, "YourUpload").await.unwrap();
    assert_eq!(media.url, "https://vidcache.example/v/abc.mp4");
    assert_eq!(referer(&media), Some("https://www.yourupload.com/"));
}

/// Test: blogger pages yield the longest googlevideo URL, unescaped
#[tokio::test]
async fn test_blogger_googlevideo() {
    let page = "https://www.blogger.com/video.g?token=t1";
    let body = r#"<script>var VIDEO_CONFIG = {"streams":[{"play_url":"https://rr1---sn.googlevideo.com/videoplayback?id=1&itag=18"}]}</script>"#;
    let resolver = embeds(Arc::new(MemoryFetcher::default().page(page, body)));

    let media = resolver.resolve(page, "Blogger").await.unwrap();
    assert_eq!(media.url, "https://rr1---sn.googlevideo.com/videoplayback?id=1&itag=18");
    assert_eq!(referer(&media), Some("https://www.blogger.com/"));
}

// =============================================================================
// Recursion Bound
// =============================================================================

fn desustream_chain(pages: usize) -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::default();
    for i in 1..=pages {
        let url = format!("https://desustream.info/dstream/{}", i);
        let next = if i == pages {
            "https://cdn.desu.example/final.mp4".to_string()
        } else {
            format!("https://desustream.info/dstream/{}", i + 1)
        };
        fetcher = fetcher.page(&url, &iframe(&next));
    }
    fetcher
}

/// Test: a chain of three wrapper pages resolves
#[tokio::test]
async fn test_three_nested_wrappers_resolve() {
    let resolver = embeds(Arc::new(desustream_chain(3)));
    let media = resolver
        .resolve("https://desustream.info/dstream/1", "Desudrive")
        .await
        .unwrap();
    assert_eq!(media.url, "https://cdn.desu.example/final.mp4");
    assert_eq!(referer(&media), Some("https://desustream.info/"));
}

/// Test: a fourth wrapper page exceeds the depth limit
#[tokio::test]
async fn test_four_nested_wrappers_give_up() {
    let resolver = embeds(Arc::new(desustream_chain(4)));
    assert_eq!(
        resolver
            .resolve("https://desustream.info/dstream/1", "Desudrive")
            .await,
        None
    );
}

/// Test: a lower depth limit cuts the chain earlier
#[tokio::test]
async fn test_custom_max_depth() {
    let resolver = embeds(Arc::new(desustream_chain(2))).with_max_depth(1);
    assert_eq!(
        resolver
            .resolve("https://desustream.info/dstream/1", "Desudrive")
            .await,
        None
    );
}

// =============================================================================
// Safelinks
// =============================================================================

const GATEWAY: &str = "https://safelink.example/?id=abc";

/// Test: meta refresh leads to pixeldrain, which is then rewritten
#[tokio::test]
async fn test_safelink_to_pixeldrain() {
    let body = r#"<html><head><meta http-equiv="refresh" content="0;URL=https://pixeldrain.com/u/AbC123"></head></html>"#;
    let fetcher = Arc::new(MemoryFetcher::default().page(GATEWAY, body));

    assert_eq!(
        unwrap_safelink(fetcher.as_ref(), GATEWAY).await.as_deref(),
        Some("https://pixeldrain.com/u/AbC123")
    );

    let media = embeds(fetcher).resolve(GATEWAY, "Safelink").await.unwrap();
    assert_eq!(media.url, "https://pixeldrain.com/api/file/AbC123");
}

/// Test: an unreachable gateway unwraps to nothing
#[tokio::test]
async fn test_safelink_unreachable() {
    let fetcher = MemoryFetcher::default();
    assert_eq!(unwrap_safelink(&fetcher, GATEWAY).await, None);
}

// =============================================================================
// Tokens
// =============================================================================

const SITE: &str = "https://site.example";
const AJAX: &str = "https://site.example/wp-admin/admin-ajax.php";

fn token_fixture() -> (Arc<MemoryFetcher>, TokenResolver) {
    let player = iframe("https://desustream.info/dstream/x");
    let reply = format!(r#"{{"data":"{}"}}"#, STANDARD.encode(player));
    let blogger = r#"<script>{"play_url":"https://rr2---sn.googlevideo.com/videoplayback?id=9&itag=22"}</script>"#;

    let fetcher = Arc::new(
        MemoryFetcher::default()
            .post(AJAX, &reply)
            .page(
                "https://desustream.info/dstream/x",
                &iframe("https://www.blogger.com/video.g?token=tok"),
            )
            .page("https://www.blogger.com/video.g?token=tok", blogger),
    );
    let cache = Arc::new(TtlCache::new(Duration::from_secs(300)));
    let tokens = TokenResolver::new(Arc::new(embeds(Arc::clone(&fetcher))), cache)
        .with_endpoint("samehadaku", AjaxEndpoint::new(SITE));
    (fetcher, tokens)
}

/// Test: token → AJAX reply → wrapper → blogger → googlevideo, then cached
#[tokio::test]
async fn test_token_resolves_through_wrappers_and_caches() {
    let (fetcher, tokens) = token_fixture();
    let token: IndirectToken = "ajax:4521:2:schtml".parse().unwrap();

    let media = tokens.resolve(&token).await.unwrap();
    assert_eq!(media.url, "https://rr2---sn.googlevideo.com/videoplayback?id=9&itag=22");
    assert_eq!(referer(&media), Some("https://desustream.info/"));
    assert_eq!(fetcher.posts_made(), 1);

    let again = tokens.resolve(&token).await.unwrap();
    assert_eq!(again, media);
    assert_eq!(fetcher.posts_made(), 1);
}

/// Test: an unresolvable iframe is returned with UA and site Referer
#[tokio::test]
async fn test_token_falls_back_to_iframe_url() {
    let reply = format!(
        r#"{{"data":"{}"}}"#,
        STANDARD.encode(iframe("https://unknown-host.example/e/1"))
    );
    let fetcher = Arc::new(MemoryFetcher::default().post(AJAX, &reply));
    let tokens = TokenResolver::new(
        Arc::new(embeds(fetcher)),
        Arc::new(TtlCache::new(Duration::from_secs(300))),
    )
    .with_endpoint("samehadaku", AjaxEndpoint::new(SITE));

    let token: IndirectToken = "ajax:1:1:schtml".parse().unwrap();
    let media = tokens.resolve(&token).await.unwrap();
    assert_eq!(media.url, "https://unknown-host.example/e/1");
    assert_eq!(referer(&media), Some("https://site.example/"));
    assert!(media.headers.contains_key("User-Agent"));
}

/// Test: failed AJAX calls are errors and are not cached
#[tokio::test]
async fn test_token_failure_not_cached() {
    let fetcher = Arc::new(MemoryFetcher::default());
    let tokens = TokenResolver::new(
        Arc::new(embeds(Arc::clone(&fetcher))),
        Arc::new(TtlCache::new(Duration::from_secs(300))),
    )
    .with_endpoint("samehadaku", AjaxEndpoint::new(SITE));

    let token: IndirectToken = "ajax:1:1:schtml".parse().unwrap();
    assert!(tokens.resolve(&token).await.is_err());
    assert!(tokens.resolve(&token).await.is_err());
    assert_eq!(fetcher.posts_made(), 2);
}

// =============================================================================
// Link Pipeline
// =============================================================================

fn pipeline(fetcher: Arc<MemoryFetcher>) -> LinkResolver {
    let embeds = Arc::new(embeds(fetcher));
    let tokens = Arc::new(TokenResolver::new(
        Arc::clone(&embeds),
        Arc::new(TtlCache::new(Duration::from_secs(300))),
    ));
    LinkResolver::new(embeds, tokens)
}

/// Test: browser-only hosts resolve to a browser fallback
#[tokio::test]
async fn test_pipeline_browser_fallback() {
    let resolver = pipeline(Arc::new(MemoryFetcher::default()));
    let target = LinkTarget::Url("https://mega.nz/file/abc".to_string());
    assert_eq!(
        resolver.resolve_target(&target, "Mega").await,
        Resolution::Browser("https://mega.nz/file/abc".to_string())
    );
}

/// Test: direct-stream links on hosts without a strategy play unchanged
#[tokio::test]
async fn test_pipeline_direct_tier_without_route() {
    let resolver = pipeline(Arc::new(MemoryFetcher::default()));
    let mut raw = RawLink::new("Ondesu", "https://ondesu.example/v/1", "720p", "otakudesu");
    raw.tag = Some(nimelink::models::ProviderTag::Stream);
    let link = Classifier::default().classify(&raw).unwrap();

    let resolution = resolver.resolve_link(&link).await;
    assert_eq!(
        resolution.media().map(|m| m.url.as_str()),
        Some("https://ondesu.example/v/1")
    );
}

/// Test: a token for a provider with no endpoint is unavailable
#[tokio::test]
async fn test_pipeline_unknown_token_provider() {
    let resolver = pipeline(Arc::new(MemoryFetcher::default()));
    let target = LinkTarget::Url("samehadaku:1:1:schtml".to_string()).upgrade_legacy();
    assert!(target.is_token());

    let mut token: IndirectToken = "ajax:1:1:schtml".parse().unwrap();
    token.provider = "nowhere".to_string();
    let resolution = resolver
        .resolve_target(&LinkTarget::Token(token), "")
        .await;
    assert!(matches!(resolution, Resolution::Unavailable(_)));
}
