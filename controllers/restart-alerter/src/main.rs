//! Pod Restart Alerter
//!
//! Watches pods for container restarts and posts an alert to a Microsoft
//! Teams incoming webhook for each one:
//! - The first sighting of a container is a baseline, never an alert
//! - Each container is muted for `MUTE_SECONDS` after an alert
//! - State is in-memory only and rebuilt from the cluster on start

mod alert;
mod config;
mod controller;
mod error;
mod keys;
mod mute;
mod queue;
mod reconciler;
mod tracker;
mod watcher;

use anyhow::{Context, Result};
use config::Config;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Pod Restart Alerter");

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    // Load configuration from environment variables
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration:");
    info!("  Cluster name: {}", config.cluster_name);
    info!("  Mute window: {}s", config.mute_seconds);
    info!("  Workers: {}", config.workers);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Webhook timeout: {}s", config.webhook_timeout.as_secs());

    // Initialize and run controller
    let controller = Controller::new(&config)
        .await
        .context("Failed to initialize controller")?;

    let stop = CancellationToken::new();
    tokio::spawn(shutdown_signal(stop.clone()));

    controller.run(stop).await.context("Controller stopped with an error")?;

    Ok(())
}

/// Cancels `stop` on SIGINT or SIGTERM.
async fn shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received");
    stop.cancel();
}
