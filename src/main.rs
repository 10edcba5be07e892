//! ==============================================================================
//! main.rs - sensor-stream entry point
//! ==============================================================================
//!
//! purpose:
//!     one binary, two roles:
//!     - `serve`: tick the (simulated) accelerometer and broadcast each
//!       reading over websocket, serving a small page that renders it.
//!     - `watch`: connect to a server, merge every frame into one sensor
//!       state and render it to the terminal or a file.
//!
//! relationships:
//!     - uses: config.rs (stream.toml + flag overrides)
//!     - uses: server.rs (serve), listener.rs + render.rs (watch)
//!
//! ==============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sensor_stream::config::{StreamConfig, TargetKind};
use sensor_stream::server::{self, AppState};
use sensor_stream::{listener, open_target, Disconnect, Fields, Sensor, Session};

/// Stream accelerometer readings over WebSocket and watch them
#[derive(Debug, Parser)]
#[command(name = "sensor-stream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: config/stream.toml, then ../config/stream.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Broadcast readings to websocket clients
    Serve(ServeArgs),
    /// Render the merged state of a stream
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// http service address
    #[arg(long)]
    addr: Option<String>,

    /// milliseconds between readings
    #[arg(long)]
    tick_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// server host[:port]; connects to ws://{host}/ws
    #[arg(long, conflicts_with = "url")]
    host: Option<String>,

    /// full websocket url
    #[arg(long)]
    url: Option<String>,

    /// render into this file instead of the terminal
    #[arg(long)]
    out: Option<PathBuf>,

    /// initial state as a json object, e.g. '{"x":0,"y":0,"z":0}'
    #[arg(long)]
    seed: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StreamConfig::load(path)?,
        None => StreamConfig::load_or_default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        // stdout belongs to the terminal render target
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => {
            if let Some(addr) = args.addr {
                config.server.addr = addr;
            }
            if let Some(tick_ms) = args.tick_ms {
                config.server.tick_ms = tick_ms;
            }
            run_serve(&config).await
        }
        Command::Watch(args) => {
            if let Some(host) = args.host {
                config.client.host = host;
            }
            if let Some(out) = args.out {
                config.render.target = TargetKind::File;
                config.render.path = out;
            }
            let url = args.url.unwrap_or_else(|| listener::ws_url(&config.client.host));
            run_watch(&config, &url, args.seed.as_deref()).await
        }
    }
}

async fn run_serve(config: &StreamConfig) -> Result<()> {
    println!("===========================================================");
    println!("  sensor-stream - serve");
    println!("===========================================================");
    config.print_summary();

    let tcp = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Could not bind server to address '{}'", config.server.addr))?;
    tracing::info!("opening server on {}", tcp.local_addr()?);

    let state = AppState::new().show_data(config.logging.show_sensor_data);

    let web_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(tcp, web_state).await {
            tracing::error!("web server error: {:#}", e);
        }
    });

    server::run_ticker(
        state,
        Duration::from_millis(config.server.tick_ms),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", e);
            }
        },
    )
    .await;

    tracing::info!("goodbye");
    Ok(())
}

async fn run_watch(config: &StreamConfig, url: &str, seed: Option<&str>) -> Result<()> {
    let sensor = match seed {
        Some(raw) => Sensor::with_seed(&parse_seed(raw)?),
        None => Sensor::new(),
    };

    // a missing render target is fatal at startup
    let target = open_target(&config.render).context("cannot start watcher")?;
    let mut session = Session::new(sensor, target).show_data(config.logging.show_sensor_data);

    match listener::watch(url, &mut session).await? {
        Disconnect::Closed { code, reason } => {
            eprintln!("WebSocket connection closed ({:?} {})", code, reason);
            Ok(())
        }
        Disconnect::Errored(e) => bail!("WebSocket error: {}", e),
    }
}

fn parse_seed(raw: &str) -> Result<Fields> {
    match serde_json::from_str::<serde_json::Value>(raw).context("--seed is not valid json")? {
        serde_json::Value::Object(fields) => Ok(fields),
        _ => bail!("--seed must be a json object"),
    }
}
