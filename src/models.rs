//! Data structures and types for nimelink
//!
//! Contains all shared models used across the application organized by domain:
//! - **Catalog**: anime and episode references returned by providers
//! - **Links**: raw and classified server links, indirection tokens
//! - **Media**: resolved media and relay requests
//! - **Aggregation**: ranked streams served by the addon API

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Header name → value, ordered so encodings are deterministic
pub type Headers = BTreeMap<String, String>;

/// Marker prepended to servers that play directly in the media player
pub const STREAM_MARKER: &str = "🎬";

/// Marker prepended to servers that need a browser
pub const BROWSER_MARKER: &str = "🌐";

// =============================================================================
// Catalog Models (provider search results)
// =============================================================================

/// Anime entry returned by a provider search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeRef {
    pub provider: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl fmt::Display for AnimeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.provider)
    }
}

/// Episode number as published by the site.
///
/// Sites use labels like "12", "12 END", "OVA" or "?", so the raw text is kept
/// and the numeric part is extracted on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeNumber(pub String);

impl EpisodeNumber {
    /// Placeholder used when a site gives no usable number
    pub fn unknown() -> Self {
        Self("?".to_string())
    }

    /// First run of digits in the label, if any
    pub fn numeric(&self) -> Option<u32> {
        let digits: String = self
            .0
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EpisodeNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Numbered episodes sort numerically and ahead of unnumbered ones.
impl Ord for EpisodeNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EpisodeNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Episode entry returned by a provider episode listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub provider: String,
    pub anime: AnimeRef,
    pub number: EpisodeNumber,
    pub title: String,
    pub url: String,
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Episode {} - {}", self.number, self.title)
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Video quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    UHD4K,
    FHD1080p,
    HD720p,
    SD480p,
    LD360p,
    #[default]
    Unknown,
}

impl Quality {
    /// Parse quality from a string (e.g., "1080p", "m720p", "[SubsPlease] ... (480p)")
    pub fn from_str_loose(s: &str) -> Self {
        let s_lower = s.to_lowercase();
        if s_lower.contains("4k") || s_lower.contains("2160p") || s_lower.contains("uhd") {
            Quality::UHD4K
        } else if s_lower.contains("1080p") || s_lower.contains("fhd") {
            Quality::FHD1080p
        } else if s_lower.contains("720p") {
            Quality::HD720p
        } else if s_lower.contains("480p") {
            Quality::SD480p
        } else if s_lower.contains("360p") {
            Quality::LD360p
        } else {
            Quality::Unknown
        }
    }

    /// Quality ranking for sorting (higher = better)
    pub fn rank(&self) -> u8 {
        match self {
            Quality::UHD4K => 5,
            Quality::FHD1080p => 4,
            Quality::HD720p => 3,
            Quality::SD480p => 2,
            Quality::LD360p => 1,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::UHD4K => write!(f, "4K"),
            Quality::FHD1080p => write!(f, "1080p"),
            Quality::HD720p => write!(f, "720p"),
            Quality::SD480p => write!(f, "480p"),
            Quality::LD360p => write!(f, "360p"),
            Quality::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Ord for Quality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// Link Models
// =============================================================================

/// Parameters a provider needs to turn a token into a real URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenParams {
    /// Nonce-protected mirror request (`action`, `nonce`, JSON payload)
    Mirror {
        action: String,
        nonce: String,
        payload: serde_json::Map<String, serde_json::Value>,
    },
    /// Player option request (`post`, `nume`, `type`)
    PlayerOption {
        post: String,
        nume: String,
        #[serde(rename = "type")]
        option_type: String,
    },
}

/// Deferred provider call standing in for a link URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectToken {
    pub provider: String,
    pub params: TokenParams,
}

/// Errors parsing the colon-joined token form some scrapers still emit
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("Expected {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("Unknown token scheme: {0}")]
    UnknownScheme(String),
    #[error("Payload is not base64 JSON: {0}")]
    BadPayload(String),
}

impl IndirectToken {
    /// Key used by the token cache
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// Parses `otakudesu:ACTION:NONCE:B64PAYLOAD` and `ajax:POST:NUME:TYPE`
/// (`samehadaku:` is accepted for the latter, matching `Display`)
impl FromStr for IndirectToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(TokenParseError::FieldCount {
                expected: 4,
                got: parts.len(),
            });
        }

        match parts[0] {
            "otakudesu" => {
                let decoded = STANDARD
                    .decode(parts[3])
                    .map_err(|e| TokenParseError::BadPayload(e.to_string()))?;
                let payload = serde_json::from_slice(&decoded)
                    .map_err(|e| TokenParseError::BadPayload(e.to_string()))?;
                Ok(Self {
                    provider: "otakudesu".to_string(),
                    params: TokenParams::Mirror {
                        action: parts[1].to_string(),
                        nonce: parts[2].to_string(),
                        payload,
                    },
                })
            }
            "ajax" | "samehadaku" => Ok(Self {
                provider: "samehadaku".to_string(),
                params: TokenParams::PlayerOption {
                    post: parts[1].to_string(),
                    nume: parts[2].to_string(),
                    option_type: parts[3].to_string(),
                },
            }),
            other => Err(TokenParseError::UnknownScheme(other.to_string())),
        }
    }
}

impl fmt::Display for IndirectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.params {
            TokenParams::Mirror {
                action,
                nonce,
                payload,
            } => {
                let json = serde_json::Value::Object(payload.clone()).to_string();
                write!(
                    f,
                    "{}:{}:{}:{}",
                    self.provider,
                    action,
                    nonce,
                    STANDARD.encode(json)
                )
            }
            TokenParams::PlayerOption {
                post,
                nume,
                option_type,
            } => write!(f, "{}:{}:{}:{}", self.provider, post, nume, option_type),
        }
    }
}

/// Where a raw link points: a fetchable URL or a deferred provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkTarget {
    Url(String),
    Token(IndirectToken),
}

impl LinkTarget {
    pub fn is_token(&self) -> bool {
        matches!(self, LinkTarget::Token(_))
    }

    /// URL text for keyword matching; tokens have none
    pub fn url(&self) -> Option<&str> {
        match self {
            LinkTarget::Url(u) => Some(u),
            LinkTarget::Token(_) => None,
        }
    }

    /// Upgrade a URL string that is really a colon-joined legacy token
    pub fn upgrade_legacy(self) -> Self {
        match self {
            LinkTarget::Url(u) => match u.parse::<IndirectToken>() {
                Ok(token) => LinkTarget::Token(token),
                Err(_) => LinkTarget::Url(u),
            },
            token => token,
        }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::Url(u) => write!(f, "{}", u),
            LinkTarget::Token(t) => write!(f, "{}", t),
        }
    }
}

/// How the provider itself tagged a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Stream,
    Download,
}

/// Server entry as listed by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub server: String,
    #[serde(rename = "url")]
    pub target: LinkTarget,
    #[serde(default = "unknown_resolution")]
    pub resolution: String,
    #[serde(default)]
    pub provider: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ProviderTag>,
}

fn unknown_resolution() -> String {
    "Unknown".to_string()
}

impl RawLink {
    /// Plain URL link with no provider tag
    pub fn new(
        server: impl Into<String>,
        url: impl Into<String>,
        resolution: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            target: LinkTarget::Url(url.into()),
            resolution: resolution.into(),
            provider: provider.into(),
            tag: None,
        }
    }

    /// Same link with a legacy token string turned into a real token
    pub fn upgrade_legacy(mut self) -> Self {
        self.target = self.target.upgrade_legacy();
        self
    }
}

/// Playability tier, in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTier {
    DirectStream,
    BrowserEmbed,
    DownloadOnly,
}

impl LinkTier {
    /// Marker shown in front of the server label
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            LinkTier::DirectStream => Some(STREAM_MARKER),
            LinkTier::BrowserEmbed => Some(BROWSER_MARKER),
            LinkTier::DownloadOnly => None,
        }
    }
}

impl fmt::Display for LinkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTier::DirectStream => write!(f, "Stream"),
            LinkTier::BrowserEmbed => write!(f, "Browser"),
            LinkTier::DownloadOnly => write!(f, "Download"),
        }
    }
}

/// Raw link annotated with its tier and display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedLink {
    #[serde(flatten)]
    pub raw: RawLink,
    pub tier: LinkTier,
    pub display_server: String,
}

impl ClassifiedLink {
    /// Raw link as it would look if fed back through the classifier
    pub fn to_raw(&self) -> RawLink {
        RawLink {
            server: self.display_server.clone(),
            ..self.raw.clone()
        }
    }
}

impl fmt::Display for ClassifiedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display_server, self.raw.resolution)
    }
}

// =============================================================================
// Media Models
// =============================================================================

/// Final fetchable resource; `headers` must accompany every request to `url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
}

impl ResolvedMedia {
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_headers(url: impl Into<String>, headers: Headers) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }

    pub fn needs_headers(&self) -> bool {
        !self.headers.is_empty()
    }
}

/// Errors decoding a relay request parameter
#[derive(Debug, Error)]
pub enum RelayDecodeError {
    #[error("data parameter is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("data parameter is not a relay request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("target url must be http(s): {0}")]
    BadTarget(String),
}

/// Target and headers the relay should use, carried in the proxy URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(rename = "url")]
    pub target_url: String,
    #[serde(default)]
    pub headers: Headers,
}

impl RelayRequest {
    pub fn new(target_url: impl Into<String>, headers: Headers) -> Self {
        Self {
            target_url: target_url.into(),
            headers,
        }
    }

    /// base64(JSON) form used in the `data` query parameter
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode the `data` parameter. Spaces are read as `+` for clients that
    /// forgot to percent-encode the value.
    pub fn decode(data: &str) -> Result<Self, RelayDecodeError> {
        let data = data.trim().replace(' ', "+");
        let bytes = STANDARD.decode(data.as_bytes())?;
        let request: RelayRequest = serde_json::from_slice(&bytes)?;

        if !request.target_url.starts_with("http://") && !request.target_url.starts_with("https://")
        {
            return Err(RelayDecodeError::BadTarget(request.target_url));
        }
        Ok(request)
    }
}

// =============================================================================
// Aggregation Models (addon protocol)
// =============================================================================

/// What an aggregated stream points at; exactly one of these
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamTarget {
    Torrent {
        #[serde(rename = "infoHash")]
        info_hash: String,
        #[serde(rename = "fileIdx", default, skip_serializing_if = "Option::is_none")]
        file_idx: Option<u32>,
    },
    Url {
        url: String,
    },
    External {
        #[serde(rename = "externalUrl")]
        external_url: String,
    },
}

/// Stream entry returned by the aggregation API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedStream {
    #[serde(rename = "name")]
    pub label: String,
    #[serde(flatten)]
    pub target: StreamTarget,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "reliabilityTier", default)]
    pub reliability_tier: u8,
}

impl AggregatedStream {
    pub fn torrent(label: impl Into<String>, info_hash: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            label,
            StreamTarget::Torrent {
                info_hash: info_hash.into(),
                file_idx: None,
            },
            description,
        )
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(label, StreamTarget::Url { url: url.into() }, description)
    }

    pub fn external(label: impl Into<String>, url: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            label,
            StreamTarget::External {
                external_url: url.into(),
            },
            description,
        )
    }

    fn new(label: impl Into<String>, target: StreamTarget, description: impl Into<String>) -> Self {
        let mut stream = Self {
            label: label.into(),
            target,
            description: description.into(),
            reliability_tier: 0,
        };
        stream.reliability_tier = stream.reliability();
        stream
    }

    /// Ranking bucket: 0 torrent, 1 direct stream, 2 browser/external, 3 other
    pub fn reliability(&self) -> u8 {
        if self.label.to_lowercase().contains("torrent") {
            return 0;
        }
        match &self.target {
            StreamTarget::Torrent { .. } => 0,
            StreamTarget::Url { url } if url.is_empty() => 3,
            StreamTarget::Url { url } if url.contains("/embed/") => 2,
            StreamTarget::Url { .. } => 1,
            StreamTarget::External { .. } => 2,
        }
    }

    /// Identity used for de-duplication within one response
    pub fn identity(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for AggregatedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.label, self.description)
    }
}

/// Episode being looked up: `{externalId}:{season}:{episode}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeQuery {
    pub external_id: String,
    pub season: u32,
    pub episode: u32,
}

impl EpisodeQuery {
    /// Parse a video id such as `tt0409591:1:1`, `tmdb:31910:1:1` or
    /// `tt0409591:1:1.json`
    pub fn parse(video_id: &str) -> Option<Self> {
        let id = video_id.strip_suffix(".json").unwrap_or(video_id);
        let mut parts = id.split(':');
        let mut external_id = parts.next().filter(|s| !s.is_empty())?.to_string();
        if external_id == "tmdb" {
            let tmdb_id = parts.next().filter(|s| !s.is_empty())?;
            external_id = format!("tmdb:{}", tmdb_id);
        }
        let season = parts.next()?.parse().ok()?;
        let episode = parts.next()?.parse().ok()?;
        Some(Self {
            external_id,
            season,
            episode,
        })
    }
}

impl fmt::Display for EpisodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} S{:02}E{:02}",
            self.external_id, self.season, self.episode
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_number_numeric() {
        assert_eq!(EpisodeNumber::from("12").numeric(), Some(12));
        assert_eq!(EpisodeNumber::from("Episode 7 END").numeric(), Some(7));
        assert_eq!(EpisodeNumber::unknown().numeric(), None);
    }

    #[test]
    fn test_episode_number_ordering() {
        let mut eps: Vec<EpisodeNumber> = ["10", "?", "2", "OVA", "1"]
            .iter()
            .map(|s| EpisodeNumber::from(*s))
            .collect();
        eps.sort();
        let labels: Vec<&str> = eps.iter().map(|e| e.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "10", "?", "OVA"]);
    }

    #[test]
    fn test_quality_from_labels() {
        assert_eq!(Quality::from_str_loose("m720p"), Quality::HD720p);
        assert_eq!(Quality::from_str_loose("360p"), Quality::LD360p);
        assert_eq!(Quality::from_str_loose("Unknown"), Quality::Unknown);
        assert!(Quality::FHD1080p > Quality::SD480p);
    }

    #[test]
    fn test_token_legacy_roundtrip() {
        let payload = STANDARD.encode(r#"{"id":123,"i":0,"q":"720p"}"#);
        let raw = format!("otakudesu:abc:def:{}", payload);
        let token: IndirectToken = raw.parse().unwrap();

        match &token.params {
            TokenParams::Mirror { action, nonce, payload } => {
                assert_eq!(action, "abc");
                assert_eq!(nonce, "def");
                assert_eq!(payload["q"], "720p");
            }
            other => panic!("unexpected params: {:?}", other),
        }

        let again: IndirectToken = token.to_string().parse().unwrap();
        assert_eq!(again, token);
    }

    #[test]
    fn test_token_player_option() {
        let token: IndirectToken = "ajax:4521:2:schtml".parse().unwrap();
        assert_eq!(token.provider, "samehadaku");
        assert_eq!(token.to_string(), "samehadaku:4521:2:schtml");
        assert_eq!(token.to_string().parse::<IndirectToken>().unwrap(), token);
    }

    #[test]
    fn test_raw_link_upgrades_legacy_token() {
        let raw: RawLink =
            serde_json::from_str(r#"{"server":"Mega","url":"ajax:4521:2:schtml"}"#).unwrap();
        assert!(!raw.target.is_token());
        let upgraded = raw.upgrade_legacy();
        assert!(upgraded.target.is_token());
        let plain = RawLink::new("Mega", "https://mega.nz/file/x", "720p", "x").upgrade_legacy();
        assert!(!plain.target.is_token());
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!("https://example.com/x".parse::<IndirectToken>().is_err());
        assert_eq!(
            "ftp:a:b:c".parse::<IndirectToken>(),
            Err(TokenParseError::UnknownScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_link_target_deserializes_url_and_token() {
        let url: LinkTarget = serde_json::from_str(r#""https://x.example/e/1""#).unwrap();
        assert_eq!(url, LinkTarget::Url("https://x.example/e/1".to_string()));

        let token: LinkTarget = serde_json::from_str(
            r#"{"provider":"samehadaku","params":{"kind":"player_option","post":"1","nume":"2","type":"schtml"}}"#,
        )
        .unwrap();
        assert!(token.is_token());
    }

    #[test]
    fn test_relay_request_encoding() {
        let mut headers = Headers::new();
        headers.insert("Referer".to_string(), "https://a.example/".to_string());
        let req = RelayRequest::new("https://cdn.example/v.mp4", headers);

        let decoded = RelayRequest::decode(&req.encode()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_relay_request_rejects_bad_input() {
        assert!(RelayRequest::decode("!!!").is_err());
        assert!(RelayRequest::decode(&STANDARD.encode("{}")).is_err());
        assert!(RelayRequest::decode(&STANDARD.encode(r#"{"url":"file:///etc/passwd"}"#)).is_err());
    }

    #[test]
    fn test_aggregated_stream_reliability() {
        assert_eq!(AggregatedStream::torrent("Torrent - 1080p", "abc", "").reliability_tier, 0);
        assert_eq!(AggregatedStream::url("Sokuja - 720p", "https://s.example/v.mp4", "").reliability_tier, 1);
        assert_eq!(AggregatedStream::url("X", "https://x.example/embed/1", "").reliability_tier, 2);
        assert_eq!(AggregatedStream::external("Mega", "https://mega.nz/file/x", "").reliability_tier, 2);
        assert_eq!(AggregatedStream::url("Broken", "", "").reliability_tier, 3);
    }

    #[test]
    fn test_aggregated_stream_json_shape() {
        let stream = AggregatedStream::torrent("Torrent", "abcdef", "👥 10 seeders");
        let json = serde_json::to_value(&stream).unwrap();
        assert_eq!(json["name"], "Torrent");
        assert_eq!(json["infoHash"], "abcdef");
        assert!(json.get("url").is_none());

        let back: AggregatedStream = serde_json::from_value(json).unwrap();
        assert_eq!(back, stream);
    }

    #[test]
    fn test_episode_query_parse() {
        let q = EpisodeQuery::parse("tt0409591:1:3.json").unwrap();
        assert_eq!(q.external_id, "tt0409591");
        assert_eq!((q.season, q.episode), (1, 3));
        assert!(EpisodeQuery::parse("tt0409591:1").is_none());

        let tmdb = EpisodeQuery::parse("tmdb:31910:2:5").unwrap();
        assert_eq!(tmdb.external_id, "tmdb:31910");
        assert_eq!((tmdb.season, tmdb.episode), (2, 5));
        assert!(EpisodeQuery::parse("tmdb:1:2").is_none());
        assert!(EpisodeQuery::parse(":1:2").is_none());
        assert!(EpisodeQuery::parse("tt1:x:2").is_none());
    }
}
