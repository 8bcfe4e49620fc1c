//! CLI Command Tests
//!
//! Argument parsing, JSON output format, exit codes and the playback plans
//! the `play` command chooses between.

// =============================================================================
// CLI Argument Parsing Tests
// =============================================================================

mod cli_parsing {
    use clap::Parser;
    use nimelink::cli::{Cli, Command, PlayerChoice};
    use std::path::PathBuf;

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["nimelink"]).is_err());
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["nimelink", "serve"]);
        match cli.command {
            Command::Serve(cmd) => assert!(cmd.bind.is_none()),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_serve_bind() {
        let cli = Cli::parse_from(["nimelink", "serve", "-b", "0.0.0.0:7000"]);
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:7000")),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_relay_port() {
        let cli = Cli::parse_from(["nimelink", "relay", "--port", "8090"]);
        match cli.command {
            Command::Relay(cmd) => assert_eq!(cmd.port, Some(8090)),
            _ => panic!("Expected Relay command"),
        }
    }

    #[test]
    fn test_streams_basic() {
        let cli = Cli::parse_from(["nimelink", "streams", "tmdb:31910:1:1"]);
        match cli.command {
            Command::Streams(cmd) => {
                assert_eq!(cmd.video_id, "tmdb:31910:1:1");
                assert!(cmd.title.is_empty());
                assert_eq!(cmd.limit, 20); // default
            }
            _ => panic!("Expected Streams command"),
        }
    }

    #[test]
    fn test_streams_alias_and_limit() {
        let cli = Cli::parse_from(["nimelink", "st", "tt0409591:1:1", "-l", "5", "-t", "Naruto"]);
        match cli.command {
            Command::Streams(cmd) => {
                assert_eq!(cmd.limit, 5);
                assert_eq!(cmd.title, vec!["Naruto"]);
            }
            _ => panic!("Expected Streams command"),
        }
    }

    #[test]
    fn test_streams_requires_id() {
        assert!(Cli::try_parse_from(["nimelink", "streams"]).is_err());
    }

    #[test]
    fn test_links_stdin() {
        let cli = Cli::parse_from(["nimelink", "links", "-"]);
        match cli.command {
            Command::Links(cmd) => assert_eq!(cmd.file, PathBuf::from("-")),
            _ => panic!("Expected Links command"),
        }
    }

    #[test]
    fn test_resolve_with_server() {
        let cli = Cli::parse_from([
            "nimelink",
            "r",
            "https://x.example/embed/aaa",
            "--server",
            "VidhideXYZ",
        ]);
        match cli.command {
            Command::Resolve(cmd) => {
                assert_eq!(cmd.url, "https://x.example/embed/aaa");
                assert_eq!(cmd.server, "VidhideXYZ");
            }
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_verify_many() {
        let cli = Cli::parse_from(["nimelink", "verify", "https://a/1", "https://b/2", "-w"]);
        match cli.command {
            Command::Verify(cmd) => {
                assert_eq!(cmd.urls.len(), 2);
                assert!(cmd.working);
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_play_defaults() {
        let cli = Cli::parse_from(["nimelink", "pl", "https://a/e/1"]);
        match cli.command {
            Command::Play(cmd) => {
                assert!(cmd.player.is_none());
                assert!(!cmd.relay);
            }
            _ => panic!("Expected Play command"),
        }
    }

    #[test]
    fn test_play_rejects_unknown_player() {
        assert!(Cli::try_parse_from(["nimelink", "play", "https://a/e/1", "-p", "kodi"]).is_err());
        let cli = Cli::parse_from(["nimelink", "play", "https://a/e/1", "-p", "mpv"]);
        match cli.command {
            Command::Play(cmd) => assert_eq!(cmd.player, Some(PlayerChoice::Mpv)),
            _ => panic!("Expected Play command"),
        }
    }

    #[test]
    fn test_global_config_path() {
        let cli = Cli::parse_from(["nimelink", "unwrap", "https://s/x", "-c", "/tmp/n.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/n.toml")));
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(Cli::parse_from(["nimelink", "serve"]).log_level(), "info");
        assert_eq!(Cli::parse_from(["nimelink", "-q", "serve"]).log_level(), "warn");
        assert_eq!(Cli::parse_from(["nimelink", "-v", "-q", "serve"]).log_level(), "debug");
    }
}

// =============================================================================
// JSON Output Format Tests
// =============================================================================

mod json_output {
    use nimelink::cli::{BrowserFallback, ExitCode, JsonOutput, ListeningResponse, PlayResponse};

    #[test]
    fn test_json_output_success() {
        let output = JsonOutput::success("test data");
        let json = serde_json::to_string(&output).unwrap();

        assert!(json.contains("\"data\":\"test data\""));
        assert!(!json.contains("error"));
        assert!(!json.contains("exit_code")); // Should be omitted when 0
    }

    #[test]
    fn test_json_output_error() {
        let output = JsonOutput::<()>::error_msg("No streams found", ExitCode::NoStreams);
        let json = serde_json::to_string(&output).unwrap();

        assert!(json.contains("\"error\":\"No streams found\""));
        assert!(json.contains("\"exit_code\":5"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_listening_response() {
        let response = ListeningResponse {
            status: "listening".to_string(),
            url: "http://127.0.0.1:8090".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"status":"listening","url":"http://127.0.0.1:8090"}"#
        );
    }

    #[test]
    fn test_play_and_browser_responses() {
        let play = PlayResponse {
            status: "playing".to_string(),
            player: "VLC".to_string(),
            plan: "relayed".to_string(),
            url: "http://127.0.0.1:1/stream?data=x".to_string(),
        };
        let json = serde_json::to_string(&play).unwrap();
        assert!(json.contains("\"plan\":\"relayed\""));

        let browser = BrowserFallback {
            status: "browser".to_string(),
            browser_url: "https://mega.nz/file/x".to_string(),
        };
        let json = serde_json::to_string(&browser).unwrap();
        assert!(json.contains("\"browser_url\":\"https://mega.nz/file/x\""));
    }

    #[test]
    fn test_exit_code_values() {
        let codes = vec![
            (ExitCode::Success, 0),
            (ExitCode::Error, 1),
            (ExitCode::InvalidArgs, 2),
            (ExitCode::NetworkError, 3),
            (ExitCode::NoStreams, 5),
            (ExitCode::PlayerFailed, 6),
        ];
        for (code, expected) in codes {
            assert_eq!(i32::from(code), expected);
        }
    }
}

// =============================================================================
// Output Helper Tests
// =============================================================================

mod output_helpers {
    use clap::Parser;
    use nimelink::cli::{Cli, ExitCode, Output};

    #[test]
    fn test_output_json_mode() {
        let cli = Cli::parse_from(["nimelink", "--json", "serve"]);
        let output = Output::new(&cli);
        assert!(output.json);
    }

    #[test]
    fn test_output_quiet_mode() {
        let cli = Cli::parse_from(["nimelink", "--quiet", "serve"]);
        let output = Output::new(&cli);
        assert!(output.quiet);
    }

    #[test]
    fn test_error_returns_code() {
        let output = Output {
            json: true,
            quiet: true,
        };
        assert_eq!(output.error("boom", ExitCode::NetworkError), ExitCode::NetworkError);
    }
}

// =============================================================================
// Playback Plan Tests
// =============================================================================

mod playback_plans {
    use nimelink::fetch::USER_AGENT;
    use nimelink::models::{Headers, RelayRequest, ResolvedMedia};
    use nimelink::stream::{start_relay, LocalPlayer, PlaybackPlan, PlayerError, PlayerType};
    use std::time::Duration;

    fn header_bound() -> ResolvedMedia {
        let mut headers = Headers::new();
        headers.insert("Referer".to_string(), "https://desustream.info/".to_string());
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        ResolvedMedia::with_headers("https://cdn.example/v.m3u8", headers)
    }

    #[test]
    fn test_plain_media_is_direct_everywhere() {
        let media = ResolvedMedia::direct("https://pixeldrain.com/api/file/abc");
        for player in [PlayerType::Mpv, PlayerType::Vlc] {
            let plan = PlaybackPlan::for_media(&media, player, None).unwrap();
            assert_eq!(plan.kind(), "direct");
            assert_eq!(plan.url(), media.url);
        }
    }

    #[test]
    fn test_mpv_takes_header_flags() {
        let media = header_bound();
        let plan = PlaybackPlan::for_media(&media, PlayerType::Mpv, None).unwrap();
        assert_eq!(plan.kind(), "direct_with_headers");

        // The browser User-Agent contains a comma and must stay one header
        let args = LocalPlayer::new(PlayerType::Mpv).args(&plan);
        assert_eq!(
            args,
            vec![
                "--force-window=immediate".to_string(),
                "--http-header-fields-append=Referer: https://desustream.info/".to_string(),
                format!("--http-header-fields-append=User-Agent: {}", USER_AGENT),
                "https://cdn.example/v.m3u8".to_string(),
            ]
        );
        assert!(USER_AGENT.contains(','));
        let header_flags = args.iter().filter(|a| a.starts_with("--http-header")).count();
        assert_eq!(header_flags, 2);
    }

    #[test]
    fn test_vlc_without_relay_fails() {
        let err = PlaybackPlan::for_media(&header_bound(), PlayerType::Vlc, None).unwrap_err();
        assert!(matches!(err, PlayerError::RelayRequired(PlayerType::Vlc)));
        assert!(PlaybackPlan::needs_relay(&header_bound(), PlayerType::Vlc));
        assert!(!PlaybackPlan::needs_relay(&header_bound(), PlayerType::Mpv));
    }

    #[tokio::test]
    async fn test_vlc_goes_through_relay() {
        let relay = start_relay(0, Duration::from_secs(30)).await.unwrap();
        let media = header_bound();
        let plan = PlaybackPlan::for_media(&media, PlayerType::Vlc, Some(&relay)).unwrap();

        assert_eq!(plan.kind(), "relayed");
        let expected = relay.proxy_url(&RelayRequest::new(media.url.clone(), media.headers.clone()));
        assert_eq!(plan.url(), expected);

        let args = LocalPlayer::new(PlayerType::Vlc).args(&plan);
        assert_eq!(args.last().map(String::as_str), Some(expected.as_str()));
        relay.shutdown().await;
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config_file {
    use nimelink::config::Config;
    use nimelink::stream::PlayerType;

    #[test]
    fn test_full_file() {
        let toml = r#"
            tmdb_api_key = "abc"
            bind = "0.0.0.0:7100"
            addons = ["https://torrentio.strem.fun", "http://127.0.0.1:9000"]
            player = "vlc"
            relay_port = 8090
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bind, "0.0.0.0:7100");
        assert_eq!(config.addons.len(), 2);
        assert_eq!(config.player_type().unwrap(), PlayerType::Vlc);
        assert_eq!(config.relay_port, 8090);
    }

    #[test]
    fn test_unknown_player_is_error() {
        let config: Config = toml::from_str("player = \"kodi\"").unwrap();
        assert!(config.player_type().is_err());
    }
}
