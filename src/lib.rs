//! nimelink - Indonesian anime stream aggregator
//!
//! Collects episode streams from Indonesian anime sites and torrent addons,
//! resolves embed pages down to playable media and relays header-protected
//! streams to players that can't send headers themselves.
//!
//! # Modules
//!
//! - `models` - Links, tokens, resolved media and aggregated streams
//! - `links` - Link classification and tier ordering
//! - `resolve` - Embed, safelink and indirection-token resolution
//! - `stream` - Header-injecting relay and local player
//! - `aggregate` - Concurrent fan-out and reliability ranking
//! - `api` - Provider interface, sources and TMDB lookup
//! - `server` - Addon HTTP API
//! - `verify` - Link liveness checks

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod fetch;
pub mod links;
pub mod models;
pub mod resolve;
pub mod server;
pub mod stream;
pub mod verify;

pub use aggregate::{rank, Aggregator};
pub use api::{Provider, ProviderError, StreamSource};
pub use links::{classify_and_organize, organize, Classifier};
pub use models::{
    AggregatedStream, ClassifiedLink, EpisodeQuery, IndirectToken, LinkTarget, LinkTier, RawLink,
    RelayRequest, ResolvedMedia,
};
pub use resolve::{EmbedResolver, LinkResolver, Resolution};
pub use stream::{start_relay, RelayHandle};
