//! Spotislack Daemon - mirrors Spotify playback into Slack statuses
//!
//! This binary handles:
//! - Layered configuration (defaults, YAML file, environment)
//! - Structured logging
//! - The sync loop over every registered user
//! - Optional Prometheus `/metrics` endpoint
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon builds the adapters from configuration and hands them to the
//! `SyncOrchestrator`. A `CancellationToken` triggered by SIGTERM or SIGINT
//! stops the loop after the tick in progress.

mod logging;
mod service;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spotislack_core::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use service::DaemonService;

#[derive(Debug, Parser)]
#[command(name = "spotislackd", version, about = "Mirror Spotify playback into Slack statuses")]
pub struct Cli {
    /// YAML configuration file; environment variables override it
    #[arg(short, long, value_name = "PATH", env = "SPOTISLACK_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single sync pass, print its summary as JSON and exit
    #[arg(long)]
    once: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration errors are fatal and reported before logging exists
    let config = Config::load_layered(cli.config.as_deref()).context("Invalid configuration")?;

    logging::init_tracing(&config.logging, cli.verbose);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "Spotislack daemon starting (spotislackd)"
    );

    let shutdown_token = CancellationToken::new();
    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    if cli.once {
        let summary = service.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = service.run().await;

    match &result {
        Ok(()) => info!("Spotislack daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Spotislack daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
