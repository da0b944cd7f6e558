use crate::config::parse::{load_config, ConfigError};
use crate::coordinator::{CoordinatorError, CoordinatorOptions, CycleCoordinator, CycleReport};
use crate::delivery::client::{DeliveryClient, DeliveryError};
use crate::source::discover::FileDiscoverer;
use crate::source::tailer::Tailer;
use crate::storage::JsonFileCursorStore;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("delivery client error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run cycles on the configured interval until SIGINT or SIGTERM.
pub async fn run(config_path: Option<&Path>) -> Result<(), RunError> {
    let coordinator = build_coordinator(config_path).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(coordinator.run(shutdown_rx));

    info!("Forwarder started, press Ctrl+C to shutdown");
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    handle.await?;

    info!("Forwarder shutdown complete");
    Ok(())
}

/// Run exactly one cycle and return its report.
pub async fn run_once(config_path: Option<&Path>) -> Result<CycleReport, RunError> {
    let mut coordinator = build_coordinator(config_path).await?;
    Ok(coordinator.run_cycle().await)
}

async fn build_coordinator(config_path: Option<&Path>) -> Result<CycleCoordinator, RunError> {
    match config_path {
        Some(path) => info!(config_path = %path.display(), "Loading configuration"),
        None => info!("No config file found, using defaults and environment"),
    }
    let config = load_config(config_path)?;

    info!(
        root = %config.watch.root.display(),
        cursor = %config.cursor.path.display(),
        endpoint = %config.delivery.endpoint,
        tenant_id = %config.tenant_id(),
        poll_interval = ?config.watch.poll_interval,
        "Forwarder configured"
    );
    if !config.has_auth_token() {
        warn!("No auth token configured; requests will be sent without Authorization");
    }

    let sink = Arc::new(DeliveryClient::new(&config.delivery)?);
    let store = Arc::new(JsonFileCursorStore::new(&config.cursor.path));

    let coordinator = CycleCoordinator::new(
        FileDiscoverer::from_config(&config.watch),
        Tailer::new(config.tenant_id()),
        sink,
        store,
        CoordinatorOptions::from(&config.watch),
    )
    .await?;

    Ok(coordinator)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C only");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
