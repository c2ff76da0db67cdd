//! Ingest session sync (ingest-sync) - Main entry point
//!
//! Runs the synchronization engine against a recorder server and logs every
//! model change until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingest_common::config::{
    default_config_path, resolve_client_config, ConfigOverrides, TomlConfig,
};
use ingest_common::events::SyncEvent;
use ingest_sync::{EngineConfig, HttpApi, SyncEngine};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ingest-sync
#[derive(Parser, Debug)]
#[command(name = "ingest-sync")]
#[command(about = "Tape ingest session synchronization client")]
#[command(version)]
struct Args {
    /// Recorder server base URL (overrides INGEST_SERVER_URL and the config file)
    #[arg(short, long)]
    server_url: Option<String>,

    /// Status poll interval in milliseconds
    #[arg(short, long)]
    poll_interval_ms: Option<u64>,

    /// Configuration file
    #[arg(short, long, env = "INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Do not follow the cache contents counter
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let (toml_config, config_source) = TomlConfig::load_with_source(config_path.as_deref())
        .context("Failed to load configuration")?;

    let overrides = ConfigOverrides {
        server_url: args.server_url.clone(),
        poll_interval_ms: args.poll_interval_ms,
        track_cache: args.no_cache.then_some(false),
    };
    let config =
        resolve_client_config(&overrides, &toml_config).context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "ingest_sync={level},ingest_common={level}",
        level = config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ingest sync against {}", config.server_url);
    config_source.log();
    info!(
        "Poll interval {} ms, request timeout {} ms, cache tracking {}",
        config.poll_interval_ms,
        config.request_timeout_ms,
        if config.track_cache { "on" } else { "off" }
    );

    let api = HttpApi::from_config(&config).context("Failed to create HTTP client")?;
    let engine = SyncEngine::new(Arc::new(api), EngineConfig::from(&config));

    let logger = tokio::spawn(log_events(engine.subscribe()));

    engine.start();
    shutdown_signal().await;
    engine.stop().await;
    engine.settle().await;

    logger.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Log every engine event
async fn log_events(mut rx: tokio::sync::broadcast::Receiver<SyncEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match &event {
                SyncEvent::StatusUnavailable { reason, .. } => {
                    warn!("No data: {}", reason)
                }
                SyncEvent::SessionStateChanged {
                    old_state,
                    new_state,
                    ..
                } => info!("Session {} -> {}", old_state, new_state),
                SyncEvent::NavigateToReview { .. } => info!("Recording finished, review ready"),
                SyncEvent::LastSessionResult {
                    result: Some(result),
                    ..
                } => info!("Last session result: {}", result),
                other => debug!("Event: {}", other.name()),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event logger lagged, {} events skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
