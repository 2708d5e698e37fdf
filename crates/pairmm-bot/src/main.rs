//! pairmm replay driver - Entry Point
//!
//! Feeds a recorded session into the ladder market maker and journals the
//! commands it would send.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Two-instrument ladder market maker (session replay)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PAIRMM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Session events, one JSON object per line
    #[arg(short, long)]
    events: PathBuf,

    /// Write outbound commands here as JSON lines instead of logging them
    #[arg(short, long)]
    journal: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > PAIRMM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PAIRMM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let (config, found) = pairmm_bot::AppConfig::load_or_default(&config_path)?;

    pairmm_telemetry::init_logging_with(&config.telemetry.log_level)?;
    info!("Starting pairmm v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Config file not found, using defaults");
    }

    let app = pairmm_bot::Application::new(config, args.events, args.journal)?;
    app.run().await?;

    Ok(())
}
