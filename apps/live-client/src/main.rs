//! Taskboard live client entry point.
//!
//! Keeps one live channel open to the server. Each stdin line is sent as a
//! text message; every message from the server is printed to stdout. Logs
//! go to stderr.

mod config;

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use taskboard_connection::{ConnectionEvent, ConnectionManager, Endpoint};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LiveConfig;

/// Events buffered between the connection and stdout.
const EVENT_BUFFER: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "taskboard-live")]
#[command(about = "Keeps a live WebSocket channel open to a Taskboard server")]
#[command(version)]
struct Args {
    #[arg(short, long, help = "Server URL (ws:// or wss://)")]
    url: Option<Endpoint>,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, help = "Delay between reconnect attempts, in milliseconds")]
    reconnect_delay_ms: Option<u64>,

    #[arg(long, default_value = "info", help = "Log level when RUST_LOG is not set")]
    log_level: String,

    #[arg(long, help = "Write the effective configuration to the config file and exit")]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting Taskboard live client"
    );

    let path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut live = LiveConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    apply_overrides(&mut live, &args);

    if args.save_config {
        live.save(&path)?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let manager = ConnectionManager::new(live.endpoint, live.connection);
    let printer = tokio::spawn(print_events(manager.events(EVENT_BUFFER)));

    manager.connect().await;
    if !manager.is_connected() {
        warn!(endpoint = %manager.endpoint(), "server unreachable, retrying in the background");
    }

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    forward_lines(&manager, BufReader::new(tokio::io::stdin()), interrupted).await;

    manager.shutdown().await;
    // Dropping the manager releases the event sender so the printer drains
    // what is left and stops.
    drop(manager);
    let _ = printer.await;
    Ok(())
}

/// Sends each non-blank line of `input` until end of input or `stop`
/// resolves. `stop` also interrupts a send stuck on a slow peer.
async fn forward_lines<R, F>(manager: &ConnectionManager, input: R, stop: F)
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = &mut stop => {
                info!("interrupted");
                return;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                tokio::select! {
                    _ = &mut stop => {
                        info!("interrupted while sending");
                        return;
                    }
                    _ = manager.send(line) => {}
                }
            }
            Ok(None) => {
                info!("end of input");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                return;
            }
        }
    }
}

/// Command-line values win over the config file.
fn apply_overrides(config: &mut LiveConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.endpoint = url.clone();
    }
    if let Some(delay_ms) = args.reconnect_delay_ms {
        config.connection.reconnect.delay_ms = delay_ms;
    }
}

async fn print_events(mut events: mpsc::Receiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::MessageReceived(message) => println!("{message}"),
            ConnectionEvent::ConnectionChanged { connected } => {
                info!(connected, "connection changed");
            }
            ConnectionEvent::StateChanged(state) => debug!(?state, "state changed"),
        }
    }
}
