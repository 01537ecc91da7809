//! Watchlist server binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use watchlist::{gateway, Config};

/// Personal show tracker with per-user watch lists.
#[derive(Parser, Debug)]
#[command(name = "watchlist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (default: ~/.watchlist/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding users.json and the per-user lists
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env_overrides();
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    tracing::info!(
        data_dir = %config.storage.data_dir.display(),
        "Starting watchlist"
    );
    gateway::run_gateway(config).await
}
