//! Configuration management for nimelink
//!
//! Handles config file loading/saving and API key management.
//! Config is stored at ~/.config/nimelink/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::stream::relay::MIN_UPSTREAM_TIMEOUT;
use crate::stream::PlayerType;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TMDB API key or read token (TMDB_API_KEY wins)
    pub tmdb_api_key: Option<String>,
    /// Look TMDB names up on AniList for romaji titles
    pub anilist: bool,
    /// Aggregation API listen address
    pub bind: String,
    /// Stremio-compatible torrent addon base URLs
    pub addons: Vec<String>,
    pub provider_timeout_secs: u64,
    pub aggregate_timeout_secs: u64,
    /// Relay port, 0 for a random free one
    pub relay_port: u16,
    pub relay_timeout_secs: u64,
    /// Generic extractor binary
    pub extractor: String,
    pub extractor_timeout_secs: u64,
    /// mpv or vlc
    pub player: String,
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            anilist: true,
            bind: "127.0.0.1:7000".to_string(),
            addons: vec!["https://torrentio.strem.fun".to_string()],
            provider_timeout_secs: 5,
            aggregate_timeout_secs: 10,
            relay_port: 0,
            relay_timeout_secs: 30,
            extractor: "yt-dlp".to_string(),
            extractor_timeout_secs: 30,
            player: "mpv".to_string(),
            cache_ttl_secs: 300,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/nimelink/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nimelink").join("config.toml"))
    }

    /// Load config from `path` (or the default location), falling back to
    /// defaults when the file is missing or unreadable
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::path) else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// TMDB key: environment variable TMDB_API_KEY, then the config file
    pub fn tmdb_api_key(&self) -> Option<String> {
        pick_key(std::env::var("TMDB_API_KEY").ok(), self.tmdb_api_key.as_deref())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs.max(1))
    }

    /// Relay upstream timeout, never below 30 seconds
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs).max(MIN_UPSTREAM_TIMEOUT)
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn player_type(&self) -> Result<PlayerType> {
        Ok(self.player.parse()?)
    }
}

fn pick_key(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| file.filter(|k| !k.trim().is_empty()).map(str::to_string))
}
