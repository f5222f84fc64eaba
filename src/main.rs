//! Hubcast Server
//!
//! Run with: cargo run --bin hubcast -- --config config.toml
//!
//! # Configuration
//!
//! Without `--config` the server looks for `config.toml` in the user config
//! directory, `/etc/hubcast/` and the working directory; the first file
//! found must load or startup fails. Environment variables (`HUBCAST_*`)
//! override file values; `RUST_LOG` overrides the configured log level.

use clap::Parser;
use hubcast::api::{serve, AppState};
use hubcast::config::{Config, LoggingConfig};
use hubcast::websocket::Hub;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "hubcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time WebSocket broadcast hub")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load errors surface through main's error before logging exists
    let (mut config, source) = match args.config {
        Some(path) => (Config::load_with_env(&path)?, Some(path)),
        None => Config::load_default()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    init_logging(&config.logging);

    tracing::info!("Starting Hubcast v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("No config file found, using defaults with environment overrides"),
    }
    tracing::info!(
        outbound_capacity = config.hub.outbound_capacity,
        heartbeat_interval_ms = config.hub.heartbeat_interval_ms,
        "Hub configuration"
    );

    let (hub, _hub_task) = Hub::start(config.hub.clone());
    let state = AppState::new(hub, config.server.clone());

    serve(state, &config.server).await?;

    tracing::info!("Hubcast stopped");
    Ok(())
}

/// Initialize tracing from the logging config
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("hubcast={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
