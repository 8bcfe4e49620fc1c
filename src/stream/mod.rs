//! Playback infrastructure
//!
//! - Relay: loopback proxy that injects required request headers
//! - Player: mpv/VLC launch and playback planning

pub mod player;
pub mod relay;

pub use player::{LocalPlayer, PlaybackPlan, PlayerError, PlayerType};
pub use relay::{start_relay, RelayError, RelayHandle};
