//! Prints the active player whenever it changes.
//!
//! Demonstrates:
//! - Starting a server on the default port
//! - Subscribing to player notifications
//! - Querying the active player as JSON
//! - Toggling playback with `--toggle`
//!
//! Usage:
//!   cargo run --example now_playing
//!   cargo run --example now_playing -- --debug
//!   cargo run --example now_playing -- --port 8975 --toggle

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use webnowplaying::{PlayerEvent, Result, Server};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8974;
const ADAPTER_VERSION: &str = "1.0.0";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    toggle: bool,
    port: u16,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let port = args
            .iter()
            .position(|a| a == "--port")
            .and_then(|i| args.get(i + 1))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            toggle: args.iter().any(|a| a == "--toggle"),
            port,
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "webnowplaying=debug"
    } else {
        "webnowplaying=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== WebNowPlaying ===\n");

    let server = Server::builder()
        .on_event(|event| match event {
            PlayerEvent::ActivePlayerChanged(Some(player)) => {
                println!("[Active] {} - {} ({})", player.artist, player.title, player.name);
            }
            PlayerEvent::ActivePlayerChanged(None) => println!("[Active] none"),
            PlayerEvent::Added(player) => println!("[Added] player {}", player.id),
            PlayerEvent::Removed(player) => println!("[Removed] player {}", player.id),
            PlayerEvent::Updated(_) => {}
        })
        .build()?;

    let port = server.start(args.port, ADAPTER_VERSION).await?;
    println!("Listening on ws://127.0.0.1:{port}");
    println!("Press Ctrl+C to exit\n");

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut toggled = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            _ = ticker.tick() => {
                let Ok(player) = server.active_player(false) else {
                    continue;
                };
                println!("{}", player.to_json()?);

                if args.toggle && !toggled {
                    match server.try_play_pause(player.id) {
                        Ok(event_id) => {
                            let result = server.wait_for_event_result(event_id).await;
                            println!("[Toggle] {result:?}");
                        }
                        Err(e) => println!("[Toggle] rejected: {e}"),
                    }
                    toggled = true;
                }
            }
        }
    }

    server.stop().await;
    println!("\nStopped");
    Ok(())
}
