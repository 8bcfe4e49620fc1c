//! Local Player - VLC/mpv playback support
//!
//! Decides how a resolved stream reaches the player (as-is, with header
//! flags, or through the relay) and launches it.

use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::relay::RelayHandle;
use crate::models::{Headers, RelayRequest, ResolvedMedia};

/// Supported local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerType {
    /// mpv media player (default, can send request headers)
    #[default]
    Mpv,
    /// VLC media player
    Vlc,
}

impl PlayerType {
    /// Get the command name for this player
    pub fn command(&self) -> &'static str {
        match self {
            PlayerType::Vlc => {
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/VLC.app").exists() {
                    return "/Applications/VLC.app/Contents/MacOS/VLC";
                }
                "vlc"
            }
            PlayerType::Mpv => "mpv",
        }
    }

    /// Get a display name for this player
    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerType::Vlc => "VLC",
            PlayerType::Mpv => "mpv",
        }
    }

    /// Whether arbitrary request headers can be passed on the command line
    pub fn supports_headers(&self) -> bool {
        matches!(self, PlayerType::Mpv)
    }
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for PlayerType {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mpv" => Ok(PlayerType::Mpv),
            "vlc" => Ok(PlayerType::Vlc),
            other => Err(PlayerError::Unknown(other.to_string())),
        }
    }
}

/// Errors from local player operations
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Unknown player: {0} (expected mpv or vlc)")]
    Unknown(String),
    #[error("{0} can't send the required headers and no relay is running")]
    RelayRequired(PlayerType),
}

/// How a resolved stream is handed to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackPlan {
    /// Plain URL, no headers needed
    Direct { url: String },
    /// URL plus headers passed as player flags
    DirectWithHeaders { url: String, headers: Headers },
    /// Loopback relay URL that injects the headers
    Relayed { url: String },
}

impl PlaybackPlan {
    /// True if playing `media` on `player` needs the relay
    pub fn needs_relay(media: &ResolvedMedia, player: PlayerType) -> bool {
        media.needs_headers() && !player.supports_headers()
    }

    /// Pick a plan for `media`. Headers go on the command line when the
    /// player can take them, otherwise through `relay`.
    pub fn for_media(
        media: &ResolvedMedia,
        player: PlayerType,
        relay: Option<&RelayHandle>,
    ) -> Result<Self, PlayerError> {
        if !media.needs_headers() {
            return Ok(PlaybackPlan::Direct {
                url: media.url.clone(),
            });
        }
        if player.supports_headers() {
            return Ok(PlaybackPlan::DirectWithHeaders {
                url: media.url.clone(),
                headers: media.headers.clone(),
            });
        }
        let relay = relay.ok_or(PlayerError::RelayRequired(player))?;
        Ok(Self::relayed(media, relay))
    }

    /// Always go through `relay`, whatever the player supports
    pub fn relayed(media: &ResolvedMedia, relay: &RelayHandle) -> Self {
        if !media.needs_headers() {
            return PlaybackPlan::Direct {
                url: media.url.clone(),
            };
        }
        let request = RelayRequest::new(media.url.clone(), media.headers.clone());
        PlaybackPlan::Relayed {
            url: relay.proxy_url(&request),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            PlaybackPlan::Direct { url }
            | PlaybackPlan::DirectWithHeaders { url, .. }
            | PlaybackPlan::Relayed { url } => url,
        }
    }

    /// Short name for logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackPlan::Direct { .. } => "direct",
            PlaybackPlan::DirectWithHeaders { .. } => "direct_with_headers",
            PlaybackPlan::Relayed { .. } => "relayed",
        }
    }
}

/// One `--http-header-fields-append` flag per header. The plain list option
/// splits on commas, which browser User-Agents contain.
pub fn mpv_header_args(headers: &Headers) -> Vec<String> {
    headers
        .iter()
        .map(|(k, v)| format!("--http-header-fields-append={}: {}", k, v))
        .collect()
}

/// Local player for streaming content
pub struct LocalPlayer {
    player_type: PlayerType,
}

impl LocalPlayer {
    /// Create a new local player with the specified type
    pub fn new(player_type: PlayerType) -> Self {
        Self { player_type }
    }

    /// Get the player type
    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    /// Command-line arguments for a plan
    pub fn args(&self, plan: &PlaybackPlan) -> Vec<String> {
        let mut args = Vec::new();
        match self.player_type {
            PlayerType::Vlc => {
                args.push("--no-video-title-show".to_string());
            }
            PlayerType::Mpv => {
                args.push("--force-window=immediate".to_string());
                if let PlaybackPlan::DirectWithHeaders { headers, .. } = plan {
                    args.extend(mpv_header_args(headers));
                }
            }
        }
        args.push(plan.url().to_string());
        args
    }

    /// Start the player for `plan`
    pub fn play(&self, plan: &PlaybackPlan) -> Result<Child, PlayerError> {
        let args = self.args(plan);
        debug!(player = %self.player_type, plan = plan.kind(), "launching player");

        let mut cmd = Command::new(self.player_type.command());
        cmd.args(&args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(self.player_type.command().to_string())
            } else {
                PlayerError::StartFailed(e)
            }
        })
    }

    /// Play and wait for the player to close
    pub async fn play_and_wait(&self, plan: &PlaybackPlan) -> Result<(), PlayerError> {
        let mut child = self.play(plan)?;
        let status = child.wait().await?;
        info!(player = %self.player_type, ?status, "player exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_referer() -> ResolvedMedia {
        let mut headers = Headers::new();
        headers.insert("Referer".into(), "https://desustream.info/".into());
        ResolvedMedia::with_headers("https://rr1.googlevideo.com/videoplayback?id=1", headers)
    }

    #[test]
    fn test_player_type_parse() {
        assert_eq!("MPV".parse::<PlayerType>().unwrap(), PlayerType::Mpv);
        assert_eq!("vlc".parse::<PlayerType>().unwrap(), PlayerType::Vlc);
        assert!("kodi".parse::<PlayerType>().is_err());
    }

    #[test]
    fn test_plan_without_headers_is_direct() {
        let media = ResolvedMedia::direct("https://cdn.example/ep1.mp4");
        let plan = PlaybackPlan::for_media(&media, PlayerType::Vlc, None).unwrap();
        assert_eq!(
            plan,
            PlaybackPlan::Direct {
                url: "https://cdn.example/ep1.mp4".into()
            }
        );
        assert!(!PlaybackPlan::needs_relay(&media, PlayerType::Vlc));
    }

    #[test]
    fn test_plan_mpv_takes_headers() {
        let plan = PlaybackPlan::for_media(&with_referer(), PlayerType::Mpv, None).unwrap();
        assert_eq!(plan.kind(), "direct_with_headers");
        let args = LocalPlayer::new(PlayerType::Mpv).args(&plan);
        assert!(args.contains(
            &"--http-header-fields-append=Referer: https://desustream.info/".to_string()
        ));
        assert_eq!(args.last().unwrap(), plan.url());
    }

    #[test]
    fn test_plan_vlc_needs_relay() {
        let media = with_referer();
        assert!(PlaybackPlan::needs_relay(&media, PlayerType::Vlc));
        assert!(matches!(
            PlaybackPlan::for_media(&media, PlayerType::Vlc, None),
            Err(PlayerError::RelayRequired(PlayerType::Vlc))
        ));
    }

    #[test]
    fn test_mpv_header_args_keep_commas() {
        let mut headers = Headers::new();
        headers.insert("Referer".into(), "https://a/".into());
        headers.insert("User-Agent".into(), crate::fetch::USER_AGENT.into());
        assert_eq!(
            mpv_header_args(&headers),
            vec![
                "--http-header-fields-append=Referer: https://a/".to_string(),
                format!("--http-header-fields-append=User-Agent: {}", crate::fetch::USER_AGENT),
            ]
        );
    }
}
