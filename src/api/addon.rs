//! Stremio addon torrent source
//!
//! Asks a Stremio-compatible addon (Torrentio and friends) for the torrents of
//! one episode and turns them into info-hash streams. Seeds and size are
//! parsed out of the addon's free-form title.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::{ProviderError, StreamSource};
use crate::models::{AggregatedStream, EpisodeQuery, Quality, StreamTarget};

/// Label marker for torrent streams
pub const TORRENT_ICON: &str = "🧲";

/// Torrents kept per addon response
pub const MAX_TORRENTS: usize = 15;

/// Addon API response
#[derive(Debug, Deserialize)]
struct AddonResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

/// Individual stream from the addon
#[derive(Debug, Deserialize)]
struct AddonStream {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "infoHash")]
    info_hash: Option<String>,
    #[serde(rename = "fileIdx")]
    file_idx: Option<u32>,
    url: Option<String>,
}

/// Torrent parsed out of an addon stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentCandidate {
    pub info_hash: String,
    pub file_idx: Option<u32>,
    pub quality: Quality,
    pub seeds: u32,
    pub size_bytes: Option<u64>,
    pub group: Option<String>,
}

impl TorrentCandidate {
    fn from_stream(stream: AddonStream) -> Option<Self> {
        let info_hash = stream
            .info_hash
            .map(|h| h.to_lowercase())
            .or_else(|| stream.url.as_deref().and_then(extract_info_hash))?;

        Some(Self {
            info_hash,
            file_idx: stream.file_idx,
            quality: Quality::from_str_loose(&format!("{} {}", stream.name, stream.title)),
            seeds: parse_seeds(&stream.title),
            size_bytes: parse_size(&stream.title),
            group: parse_group(&stream.title),
        })
    }

    /// Human-readable size (e.g., "1.4 GB")
    pub fn format_size(&self) -> String {
        match self.size_bytes {
            Some(bytes) if bytes >= 1024 * 1024 * 1024 => {
                format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
            }
            Some(bytes) if bytes >= 1024 * 1024 => {
                format!("{:.0} MB", bytes as f64 / (1024.0 * 1024.0))
            }
            Some(bytes) => format!("{} KB", bytes / 1024),
            None => "Unknown".to_string(),
        }
    }
}

/// Info hash from a magnet URI (`btih:` + 40 hex chars), lower-cased
pub fn extract_info_hash(magnet: &str) -> Option<String> {
    let re = Regex::new(r"btih:([a-fA-F0-9]{40})").ok()?;
    re.captures(magnet).map(|c| c[1].to_lowercase())
}

/// Parse seed count from title string (e.g., "👤 142" or "👤 1.2k")
pub fn parse_seeds(title: &str) -> u32 {
    if let Some(re) = Regex::new(r"👤\s*(\d+(?:\.\d+)?)\s*(k)?").ok() {
        if let Some(caps) = re.captures(title) {
            let num: f32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let multiplier = if caps.get(2).is_some() { 1000.0 } else { 1.0 };
            return (num * multiplier) as u32;
        }
    }

    if let Some(re) = Regex::new(r"seed(?:s|ers)?:\s*(\d+)").ok() {
        if let Some(caps) = re.captures(&title.to_lowercase()) {
            return caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
        }
    }

    0
}

/// Parse size from title string (e.g., "4.2 GB" or "890 MB")
pub fn parse_size(title: &str) -> Option<u64> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)\s*(GB|MB|GiB|MiB|gb|mb)").ok()?;
    let caps = re.captures(title)?;
    let num: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_uppercase();

    match unit.as_str() {
        "GB" | "GIB" => Some((num * 1024.0 * 1024.0 * 1024.0) as u64),
        "MB" | "MIB" => Some((num * 1024.0 * 1024.0) as u64),
        _ => None,
    }
}

/// Release group from a fansub-style name (`[SubsPlease] Show - 01 (1080p)`)
/// or a scene-style one (`Show.S01E01.1080p.WEB-GROUP.mkv`)
pub fn parse_group(title: &str) -> Option<String> {
    let first_line = title.lines().next().unwrap_or_default();
    let bracketed = Regex::new(r"^\s*\[([^\]]+)\]").ok()?;
    if let Some(c) = bracketed.captures(first_line) {
        return Some(c[1].trim().to_string());
    }
    let scene = Regex::new(r"-([A-Za-z0-9]+)(?:\.[A-Za-z0-9]{2,4})?\s*$").ok()?;
    scene.captures(first_line).map(|c| c[1].to_string())
}

/// Stremio-compatible torrent addon client
pub struct AddonSource {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl AddonSource {
    /// Create a source for the public Torrentio instance
    pub fn new() -> Self {
        Self::with_base_url("https://torrentio.strem.fun")
    }

    /// Create a source with a custom base URL (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let id = url::Url::parse(&base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .filter(|h| h.parse::<std::net::IpAddr>().is_err())
            .and_then(|h| h.split('.').next().map(str::to_string))
            .unwrap_or_else(|| "addon".to_string());
        Self {
            id,
            base_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Torrents for one episode, sorted quality desc then seeds desc,
    /// duplicates by info hash removed
    pub async fn episode_torrents(
        &self,
        query: &EpisodeQuery,
    ) -> Result<Vec<TorrentCandidate>, ProviderError> {
        let url = format!(
            "{}/stream/series/{}:{}:{}.json",
            self.base_url, query.external_id, query.season, query.episode
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let data: AddonResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        let mut torrents: Vec<TorrentCandidate> = data
            .streams
            .into_iter()
            .filter_map(TorrentCandidate::from_stream)
            .collect();

        // Sort: quality descending, then seeds descending within same quality
        torrents.sort_by(|a, b| match b.quality.cmp(&a.quality) {
            std::cmp::Ordering::Equal => b.seeds.cmp(&a.seeds),
            other => other,
        });

        let mut seen = HashSet::new();
        torrents.retain(|t| seen.insert(t.info_hash.clone()));
        torrents.truncate(MAX_TORRENTS);
        Ok(torrents)
    }

    fn to_stream(&self, torrent: TorrentCandidate) -> AggregatedStream {
        let group = torrent.group.clone().unwrap_or_else(|| "Unknown".to_string());
        let label = format!("{} Torrent - {} [{}]", TORRENT_ICON, torrent.quality, group);
        let description = format!(
            "👥 {} seeders | 💾 {} | {}",
            torrent.seeds,
            torrent.format_size(),
            self.id
        );
        let mut stream = AggregatedStream::torrent(label, torrent.info_hash, description);
        if let StreamTarget::Torrent { file_idx, .. } = &mut stream.target {
            *file_idx = torrent.file_idx;
        }
        stream
    }
}

impl Default for AddonSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamSource for AddonSource {
    fn id(&self) -> &str {
        &self.id
    }

    /// Addons are keyed by external id, so the title is not used
    async fn streams(
        &self,
        _title: &str,
        query: &EpisodeQuery,
    ) -> Result<Vec<AggregatedStream>, ProviderError> {
        Ok(self
            .episode_torrents(query)
            .await?
            .into_iter()
            .map(|t| self.to_stream(t))
            .collect())
    }
}
