//! Relay Server
//!
//! Run with: cargo run -- --addr :8080 --static ./static
//!
//! # Configuration
//!
//! Settings are resolved in order: command-line flags, environment
//! variables (`RELAY_*`), config file, built-in defaults. `RUST_LOG`
//! overrides the configured log level.

use anyhow::Context;
use clap::Parser;
use relay::api::{serve, AppState};
use relay::config::{generate_default_config, Config, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "WebSocket broadcast relay")]
struct Cli {
    /// HTTP service address (host:port or :port)
    #[arg(long)]
    addr: Option<String>,

    /// Path to static files
    #[arg(long = "static")]
    static_dir: Option<PathBuf>,

    /// Config file (default: searched in standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };

    if let Some(addr) = &cli.addr {
        config.server.set_addr(addr)?;
    }
    if let Some(dir) = cli.static_dir {
        config.server.static_dir = dir;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Static directory: {:?}", config.server.static_dir);
    tracing::info!(
        outbound_capacity = config.hub.outbound_capacity,
        echo_to_sender = config.hub.echo_to_sender,
        "Hub configured"
    );

    let state = AppState::with_hub_config(config.server.clone(), config.hub.clone());
    serve(state, &config.server)
        .await
        .context("HTTP server failed")?;

    tracing::info!("Relay stopped");
    Ok(())
}

/// Initialize tracing from the logging config
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("relay={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
