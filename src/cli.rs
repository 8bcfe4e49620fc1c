//! CLI - Command Line Interface for nimelink
//!
//! Every stage of the pipeline is scriptable on its own. All output is
//! JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Run the addon API
//! nimelink serve --bind 127.0.0.1:7000
//!
//! # One aggregation
//! nimelink streams tt0409591:1:1 --title Naruto
//!
//! # Resolve and play an embed
//! nimelink play "https://desustream.info/dstream/abc" --player vlc
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::stream::PlayerType;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// No streams or no direct URL
    NoStreams = 5,
    /// Player failed to start
    PlayerFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// nimelink - Indonesian anime stream aggregator and resolver
#[derive(Parser, Debug)]
#[command(
    name = "nimelink",
    version,
    about = "Indonesian anime stream aggregator, embed resolver and header-injecting relay",
    after_help = "EXAMPLES:\n\
                  nimelink serve                              Run the addon API\n\
                  nimelink streams tt0409591:1:1 -t Naruto    Aggregate one episode\n\
                  nimelink resolve <url> --server Vidhide     Resolve an embed\n\
                  nimelink play <url> --player vlc            Resolve and play"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    /// Default log filter for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the aggregation HTTP API
    Serve(ServeCmd),

    /// Run the streaming relay
    Relay(RelayCmd),

    /// Aggregate ranked streams for one episode
    #[command(visible_alias = "st")]
    Streams(StreamsCmd),

    /// Classify and organize raw links from a JSON file
    Links(LinksCmd),

    /// Resolve an embed URL to direct media
    #[command(visible_alias = "r")]
    Resolve(ResolveCmd),

    /// Unwrap a safelink gateway URL
    Unwrap(UnwrapCmd),

    /// Check whether links are reachable
    Verify(VerifyCmd),

    /// Resolve and play locally in mpv or VLC
    #[command(visible_alias = "pl")]
    Play(PlayCmd),
}

/// Run the aggregation HTTP API (plus a relay)
#[derive(Args, Debug)]
pub struct ServeCmd {
    /// Listen address (overrides config)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,
}

/// Run the streaming relay until interrupted
#[derive(Args, Debug)]
pub struct RelayCmd {
    /// Port on 127.0.0.1 (0 picks a free one)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
}

/// Aggregate ranked streams for an episode
#[derive(Args, Debug)]
pub struct StreamsCmd {
    /// Video id: `tt0409591:1:1` or `tmdb:31910:1:1`
    #[arg(required = true)]
    pub video_id: String,

    /// Title variants to search with (skips the TMDB lookup)
    #[arg(long, short = 't')]
    pub title: Vec<String>,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Classify and organize raw links
#[derive(Args, Debug)]
pub struct LinksCmd {
    /// JSON file with an array of raw links (`-` for stdin)
    #[arg(required = true)]
    pub file: PathBuf,
}

/// Resolve an embed URL
#[derive(Args, Debug)]
pub struct ResolveCmd {
    /// Embed, wrapper or file-host URL
    #[arg(required = true)]
    pub url: String,

    /// Server name shown by the site (steers host dispatch)
    #[arg(long, short = 's', default_value = "")]
    pub server: String,
}

/// Unwrap a safelink
#[derive(Args, Debug)]
pub struct UnwrapCmd {
    /// Safelink gateway URL
    #[arg(required = true)]
    pub url: String,
}

/// Verify links
#[derive(Args, Debug)]
pub struct VerifyCmd {
    /// URLs to check
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Only print the usable ones
    #[arg(long, short = 'w')]
    pub working: bool,
}

/// Resolve and play locally
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Embed or direct URL
    #[arg(required = true)]
    pub url: String,

    /// Server name shown by the site
    #[arg(long, short = 's', default_value = "")]
    pub server: String,

    /// Player to use (overrides config)
    #[arg(long, short = 'p', value_enum)]
    pub player: Option<PlayerChoice>,

    /// Route through the relay even if the player can send headers
    #[arg(long)]
    pub relay: bool,
}

/// Local player selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerChoice {
    /// mpv media player
    Mpv,
    /// VLC media player
    Vlc,
}

impl From<PlayerChoice> for PlayerType {
    fn from(choice: PlayerChoice) -> Self {
        match choice {
            PlayerChoice::Mpv => PlayerType::Mpv,
            PlayerChoice::Vlc => PlayerType::Vlc,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Running server address
#[derive(Debug, Serialize, Deserialize)]
pub struct ListeningResponse {
    pub status: String,
    pub url: String,
}

/// Playback launch response
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayResponse {
    pub status: String,
    pub player: String,
    pub plan: String,
    pub url: String,
}

/// Resolver fallback: open this URL in a browser
#[derive(Debug, Serialize, Deserialize)]
pub struct BrowserFallback {
    pub status: String,
    pub browser_url: String,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
