//! # taskwire-gateway
//!
//! Gateway server binary — loads settings, initializes logging, and runs
//! the WebSocket gateway until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use taskwire_server::config::ServerConfig;
use taskwire_server::server::GatewayServer;
use tracing_subscriber::EnvFilter;

/// Taskwire real-time gateway.
#[derive(Parser, Debug)]
#[command(name = "taskwire-gateway", about = "Taskwire real-time gateway")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default: `~/.taskwire/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = match args.settings {
        Some(ref path) => taskwire_settings::loader::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => taskwire_settings::loader::load_settings().unwrap_or_default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ServerConfig::from_settings(&settings.server);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let server = GatewayServer::new(config);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind gateway address")?;
    tracing::info!("Gateway listening on {addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;

    Ok(())
}
