//! Aggregation HTTP API (Stremio addon protocol)
//!
//! `GET /stream/{type}/{id}.json` looks the show up on TMDB and AniList,
//! builds title variants and runs the aggregator. The endpoint never fails: any problem
//! yields `{"streams": []}` with 200.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::api::matching::title_variants;
use crate::api::{search_titles, AnilistClient, TmdbClient};
use crate::models::{AggregatedStream, EpisodeQuery};

pub const ADDON_ID: &str = "community.anime.indonesian.multi";
pub const ADDON_NAME: &str = "Indonesian Anime Streams";

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<Aggregator>,
    /// Title lookup; without it only id-keyed sources can answer
    pub tmdb: Option<Arc<TmdbClient>>,
    /// Romaji titles for the TMDB name, TMDB names are used without it
    pub anilist: Option<Arc<AnilistClient>>,
}

impl ApiState {
    pub fn new(aggregator: Arc<Aggregator>, tmdb: Option<Arc<TmdbClient>>) -> Self {
        Self {
            aggregator,
            tmdb,
            anilist: None,
        }
    }

    pub fn with_anilist(mut self, anilist: Arc<AnilistClient>) -> Self {
        self.anilist = Some(anilist);
        self
    }

    /// Prioritized search titles for an external id, empty if unknown
    async fn titles(&self, external_id: &str) -> Vec<String> {
        let Some(tmdb) = &self.tmdb else {
            return Vec::new();
        };
        match search_titles(tmdb, self.anilist.as_deref(), external_id).await {
            Ok(titles) => title_variants(&titles),
            Err(e) => {
                warn!(external_id, error = %e, "title lookup failed");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<AggregatedStream>,
}

/// Addon manifest
pub fn manifest() -> Value {
    json!({
        "id": ADDON_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "name": ADDON_NAME,
        "description": "Indonesian anime site streams and torrents, ranked by reliability",
        "resources": ["stream"],
        "types": ["series"],
        "idPrefixes": ["tt", "tmdb"],
        "catalogs": []
    })
}

async fn index() -> Json<Value> {
    Json(json!({
        "addon": ADDON_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "manifest": "/manifest.json",
            "stream": "/stream/{type}/{id}.json"
        }
    }))
}

async fn manifest_handler() -> Json<Value> {
    Json(manifest())
}

async fn streams_handler(
    State(state): State<ApiState>,
    Path((kind, video_id)): Path<(String, String)>,
) -> Json<StreamsResponse> {
    info!(kind = %kind, id = %video_id, "stream request");
    let Some(query) = EpisodeQuery::parse(&video_id) else {
        warn!(id = %video_id, "unparseable video id");
        return Json(StreamsResponse {
            streams: Vec::new(),
        });
    };

    let titles = state.titles(&query.external_id).await;
    let streams = state.aggregator.aggregate(&query, &titles).await;
    info!(query = %query, count = streams.len(), "stream response");
    Json(StreamsResponse { streams })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/manifest.json", get(manifest_handler))
        .route("/stream/{kind}/{id}", get(streams_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and return the bound address with the serving future
pub async fn bind(
    addr: &str,
    state: ApiState,
) -> anyhow::Result<(SocketAddr, impl std::future::Future<Output = std::io::Result<()>>)> {
    use anyhow::Context;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "aggregation API listening");
    let app = build_router(state);
    Ok((local, async move { axum::serve(listener, app).await }))
}
