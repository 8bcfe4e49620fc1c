//! CLI Command Handlers
//!
//! Implements all CLI commands by wiring the configured services together.
//! Each handler takes CLI args and Output, returns ExitCode.

use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::api::matching::title_variants;
use crate::api::{
    search_titles, AddonSource, AnilistClient, Provider, SiteSource, StreamSource, TmdbClient,
};
use crate::cache::TtlCache;
use crate::cli::{
    BrowserFallback, ExitCode, LinksCmd, ListeningResponse, Output, PlayCmd, PlayResponse,
    RelayCmd, ResolveCmd, ServeCmd, StreamsCmd, UnwrapCmd, VerifyCmd,
};
use crate::config::Config;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::links::{classify_and_organize, Classifier, TierCounts};
use crate::models::{ClassifiedLink, EpisodeQuery, LinkTarget, RawLink, ResolvedMedia};
use crate::resolve::{
    unwrap_safelink, EmbedResolver, GenericExtractor, LinkResolver, Resolution, TokenResolver,
    YtDlp,
};
use crate::server::{self, ApiState};
use crate::stream::{start_relay, LocalPlayer, PlaybackPlan, PlayerType, RelayHandle};
use crate::verify::{LinkVerifier, Verification};

// =============================================================================
// Service Wiring
// =============================================================================

/// Components shared by the commands, built once from config
pub struct Services {
    pub config: Config,
    pub fetcher: Arc<dyn Fetcher>,
    pub tokens: Arc<TokenResolver>,
    pub resolver: LinkResolver,
    pub verifier: LinkVerifier,
    /// Site providers served through `SiteSource`
    pub providers: Vec<Arc<dyn Provider>>,
}

impl Services {
    pub fn from_config(config: Config) -> Self {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new());
        let extractor: Arc<dyn GenericExtractor> = Arc::new(YtDlp::new(
            config.extractor.clone(),
            config.extractor_timeout(),
        ));
        let embeds = Arc::new(EmbedResolver::new(Arc::clone(&fetcher), extractor));
        let token_cache = Arc::new(TtlCache::new(config.cache_ttl()));
        let tokens = Arc::new(TokenResolver::new(Arc::clone(&embeds), token_cache));
        let verifier = LinkVerifier::new(Arc::new(TtlCache::new(config.cache_ttl())));

        Self {
            config,
            fetcher,
            resolver: LinkResolver::new(embeds, Arc::clone(&tokens)),
            tokens,
            verifier,
            providers: Vec::new(),
        }
    }

    /// Register a site provider
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// TMDB client if a key is configured
    pub fn tmdb(&self) -> Option<TmdbClient> {
        self.config.tmdb_api_key().map(TmdbClient::new)
    }

    /// AniList client unless disabled in config
    pub fn anilist(&self) -> Option<AnilistClient> {
        self.config.anilist.then(AnilistClient::new)
    }

    /// Aggregator over the registered sites and the configured addons. Site
    /// streams that need headers go through `relay` when one is given.
    pub fn aggregator(&self, relay: Option<Arc<RelayHandle>>) -> Aggregator {
        let mut sources: Vec<Arc<dyn StreamSource>> = Vec::new();
        for provider in &self.providers {
            let mut site = SiteSource::new(Arc::clone(provider), Arc::clone(&self.tokens));
            if let Some(relay) = &relay {
                site = site.with_relay(Arc::clone(relay));
            }
            sources.push(Arc::new(site));
        }
        for base in &self.config.addons {
            sources.push(Arc::new(AddonSource::with_base_url(base.as_str())));
        }
        Aggregator::new(sources).with_timeouts(
            self.config.provider_timeout(),
            self.config.aggregate_timeout(),
        )
    }

    /// Search titles for an external id, empty without a TMDB key or on failure
    pub async fn titles(&self, external_id: &str) -> Vec<String> {
        let Some(tmdb) = self.tmdb() else {
            return Vec::new();
        };
        let anilist = self.anilist();
        match search_titles(&tmdb, anilist.as_ref(), external_id).await {
            Ok(titles) => title_variants(&titles),
            Err(e) => {
                warn!(external_id, error = %e, "title lookup failed");
                Vec::new()
            }
        }
    }
}

fn print_or_error<T: Serialize>(output: &Output, data: T) -> ExitCode {
    match output.print(data) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

pub async fn serve_cmd(cmd: ServeCmd, services: Services, output: &Output) -> ExitCode {
    let bind = cmd.bind.unwrap_or_else(|| services.config.bind.clone());
    let tmdb = services.tmdb().map(Arc::new);
    if tmdb.is_none() {
        warn!("no TMDB key configured, only id-keyed sources will answer");
    }

    // Only site streams are relayed; addons serve torrents
    let relay = if services.providers.is_empty() {
        None
    } else {
        match start_relay(services.config.relay_port, services.config.relay_timeout()).await {
            Ok(relay) => Some(Arc::new(relay)),
            Err(e) => {
                warn!(error = %e, "relay unavailable, header-bound streams are served as-is");
                None
            }
        }
    };

    let mut state = ApiState::new(Arc::new(services.aggregator(relay.clone())), tmdb);
    if let Some(anilist) = services.anilist() {
        state = state.with_anilist(Arc::new(anilist));
    }
    let (addr, serving) = match server::bind(&bind, state).await {
        Ok(bound) => bound,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::NetworkError),
    };

    output.info(format!("Addon manifest: http://{}/manifest.json", addr));
    if let Some(relay) = &relay {
        output.info(format!("Relay: {}", relay.base_url()));
    }

    tokio::select! {
        result = serving => {
            if let Err(e) = result {
                return output.error(format!("Server stopped: {}", e), ExitCode::Error);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    // The server's copies are gone once it stops; a leftover one still
    // stops the relay when dropped
    if let Some(Ok(relay)) = relay.map(Arc::try_unwrap) {
        relay.shutdown().await;
    }
    ExitCode::Success
}

// =============================================================================
// Relay Command
// =============================================================================

pub async fn relay_cmd(cmd: RelayCmd, services: Services, output: &Output) -> ExitCode {
    let port = cmd.port.unwrap_or(services.config.relay_port);
    let relay = match start_relay(port, services.config.relay_timeout()).await {
        Ok(relay) => relay,
        Err(e) => return output.error(format!("Relay failed: {}", e), ExitCode::NetworkError),
    };

    let code = print_or_error(
        output,
        ListeningResponse {
            status: "listening".to_string(),
            url: relay.base_url(),
        },
    );
    if code != ExitCode::Success {
        return code;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    relay.shutdown().await;
    ExitCode::Success
}

// =============================================================================
// Streams Command
// =============================================================================

pub async fn streams_cmd(cmd: StreamsCmd, services: Services, output: &Output) -> ExitCode {
    let Some(query) = EpisodeQuery::parse(&cmd.video_id) else {
        return output.error(
            "Invalid video id (expected tt1234567:S:E or tmdb:123:S:E)",
            ExitCode::InvalidArgs,
        );
    };

    let titles = if !cmd.title.is_empty() {
        title_variants(&cmd.title)
    } else {
        services.titles(&query.external_id).await
    };

    output.info(format!("Searching {} with {} title variants", query, titles.len()));
    let mut streams = services.aggregator(None).aggregate(&query, &titles).await;
    if streams.is_empty() {
        return output.error(format!("No streams found for {}", query), ExitCode::NoStreams);
    }
    streams.truncate(cmd.limit);
    print_or_error(output, &streams)
}

// =============================================================================
// Links Command
// =============================================================================

#[derive(Debug, Serialize)]
struct OrganizedLinks {
    counts: TierCounts,
    links: Vec<ClassifiedLink>,
}

fn read_raw_links(path: &Path) -> anyhow::Result<Vec<RawLink>> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    let links: Vec<RawLink> = serde_json::from_str(&text).context("parsing raw links")?;
    Ok(links.into_iter().map(RawLink::upgrade_legacy).collect())
}

pub async fn links_cmd(cmd: LinksCmd, output: &Output) -> ExitCode {
    let raw = match read_raw_links(&cmd.file) {
        Ok(raw) => raw,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };

    let links = classify_and_organize(&Classifier::default(), &raw);
    if links.is_empty() && !raw.is_empty() {
        return output.error("No playable servers", ExitCode::NoStreams);
    }
    let counts = TierCounts::of(&links);
    output.info(counts);
    print_or_error(output, OrganizedLinks { counts, links })
}

// =============================================================================
// Resolve / Unwrap Commands
// =============================================================================

fn report_resolution(resolution: Resolution, output: &Output) -> ExitCode {
    match resolution {
        Resolution::Playable(media) => print_or_error(output, &media),
        Resolution::Browser(url) => {
            output.info("No direct URL, open it in a browser");
            let _ = output.print(BrowserFallback {
                status: "browser".to_string(),
                browser_url: url,
            });
            ExitCode::NoStreams
        }
        Resolution::Unavailable(reason) => output.error(reason, ExitCode::NoStreams),
    }
}

pub async fn resolve_cmd(cmd: ResolveCmd, services: Services, output: &Output) -> ExitCode {
    let target = LinkTarget::Url(cmd.url).upgrade_legacy();
    let resolution = services.resolver.resolve_target(&target, &cmd.server).await;
    report_resolution(resolution, output)
}

#[derive(Debug, Serialize)]
struct Unwrapped {
    url: String,
}

pub async fn unwrap_cmd(cmd: UnwrapCmd, services: Services, output: &Output) -> ExitCode {
    match unwrap_safelink(services.fetcher.as_ref(), &cmd.url).await {
        Some(url) => print_or_error(output, Unwrapped { url }),
        None => output.error("No outbound link found", ExitCode::NoStreams),
    }
}

// =============================================================================
// Verify Command
// =============================================================================

#[derive(Debug, Serialize)]
struct VerifiedUrl {
    url: String,
    #[serde(flatten)]
    verification: Verification,
}

pub async fn verify_cmd(cmd: VerifyCmd, services: Services, output: &Output) -> ExitCode {
    let checks = services.verifier.verify_urls(&cmd.urls).await;

    let mut results: Vec<VerifiedUrl> = cmd
        .urls
        .into_iter()
        .zip(checks)
        .map(|(url, verification)| VerifiedUrl { url, verification })
        .collect();
    if cmd.working {
        results.retain(|r| r.verification.status.is_usable());
    }
    print_or_error(output, &results)
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, services: Services, output: &Output) -> ExitCode {
    let player_type: PlayerType = match cmd.player {
        Some(choice) => choice.into(),
        None => match services.config.player_type() {
            Ok(p) => p,
            Err(e) => return output.error(e.to_string(), ExitCode::InvalidArgs),
        },
    };

    output.info(format!("Resolving {}...", cmd.url));
    let target = LinkTarget::Url(cmd.url).upgrade_legacy();
    let media: ResolvedMedia = match services.resolver.resolve_target(&target, &cmd.server).await {
        Resolution::Playable(media) => media,
        other => return report_resolution(other, output),
    };

    let wants_relay = media.needs_headers()
        && (cmd.relay || PlaybackPlan::needs_relay(&media, player_type));
    let relay = if wants_relay {
        match start_relay(services.config.relay_port, services.config.relay_timeout()).await {
            Ok(relay) => Some(relay),
            Err(e) => return output.error(format!("Relay failed: {}", e), ExitCode::NetworkError),
        }
    } else {
        None
    };

    let plan = match (&relay, cmd.relay) {
        (Some(relay), true) => PlaybackPlan::relayed(&media, relay),
        _ => match PlaybackPlan::for_media(&media, player_type, relay.as_ref()) {
            Ok(plan) => plan,
            Err(e) => return output.error(e.to_string(), ExitCode::PlayerFailed),
        },
    };

    let _ = output.print(PlayResponse {
        status: "playing".to_string(),
        player: player_type.to_string(),
        plan: plan.kind().to_string(),
        url: plan.url().to_string(),
    });

    let player = LocalPlayer::new(player_type);
    let result = player.play_and_wait(&plan).await;
    if let Some(relay) = relay {
        relay.shutdown().await;
    }
    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(e.to_string(), ExitCode::PlayerFailed),
    }
}
