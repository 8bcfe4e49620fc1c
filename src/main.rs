//! nimelink - Indonesian anime stream aggregator
//!
//! # Usage
//!
//! ```bash
//! # Addon API for Stremio-compatible players
//! nimelink serve
//!
//! # Resolve an embed and play it
//! nimelink play "https://desustream.info/dstream/abc" --player vlc
//!
//! # Scriptable pieces
//! nimelink streams tt0409591:1:1 --json
//! nimelink resolve "https://pixeldrain.com/u/abc"
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nimelink::cli::{Cli, Command, ExitCode, Output};
use nimelink::commands::{self, Services};
use nimelink::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(&cli);
    let config = Config::load(cli.config.as_deref());

    let services = Services::from_config(config);

    let code: ExitCode = match cli.command {
        Command::Serve(cmd) => commands::serve_cmd(cmd, services, &output).await,
        Command::Relay(cmd) => commands::relay_cmd(cmd, services, &output).await,
        Command::Streams(cmd) => commands::streams_cmd(cmd, services, &output).await,
        Command::Links(cmd) => commands::links_cmd(cmd, &output).await,
        Command::Resolve(cmd) => commands::resolve_cmd(cmd, services, &output).await,
        Command::Unwrap(cmd) => commands::unwrap_cmd(cmd, services, &output).await,
        Command::Verify(cmd) => commands::verify_cmd(cmd, services, &output).await,
        Command::Play(cmd) => commands::play_cmd(cmd, services, &output).await,
    };

    code.into()
}
