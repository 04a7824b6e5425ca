//! # tictac
//!
//! Room server binary: loads settings, installs logging and serves
//! `/ws` and `/health` until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tictac_core::BoardVariant;
use tictac_server::TictacServer;
use tictac_server::shutdown::DEFAULT_DRAIN_TIMEOUT;
use tictac_settings::{LogFormat, Settings};
use tictac_telemetry::TelemetryConfig;

/// Multiplayer tic-tac-toe room server.
#[derive(Parser, Debug)]
#[command(name = "tictac", about = "Multiplayer tic-tac-toe room server")]
struct Cli {
    /// JSON settings file. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Board used by new rooms: `classic` or `meta` (overrides settings).
    #[arg(long)]
    board: Option<BoardVariant>,

    /// Log output: `pretty` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(board) = self.board {
            settings.hub.board = board;
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn telemetry_config(settings: &Settings) -> Result<TelemetryConfig> {
    let format = match settings.logging.format {
        LogFormat::Pretty => tictac_telemetry::LogFormat::Pretty,
        LogFormat::Json => tictac_telemetry::LogFormat::Json,
    };
    let modules = settings
        .logging
        .modules
        .iter()
        .map(|(module, level)| (module.as_str(), level.as_str()));
    TelemetryConfig::from_levels(&settings.logging.level, modules, format)
        .context("Invalid logging settings")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings =
        tictac_settings::load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    cli.apply(&mut settings);
    tictac_settings::validate(&settings).context("Invalid settings")?;

    tictac_telemetry::init_telemetry(&telemetry_config(&settings)?)
        .context("Failed to initialize logging")?;

    let server = TictacServer::new(settings);
    let addr = server.listen().await.context("Failed to bind server")?;
    tracing::info!("tictac listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().drain(DEFAULT_DRAIN_TIMEOUT).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
