//! Logcast Server - Entry Point
//!
//! Starts the log dispatcher and the API server with graceful shutdown support.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logcast::api::ApiServer;
use logcast::broadcast::{DispatcherHandle, LogBroadcaster};
use logcast::config::{Config, LogConfig};
use logcast::snapshot::SnapshotReader;

#[tokio::main]
async fn main() -> logcast::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Logcast server");

    let snapshot = SnapshotReader::from_config(&config.snapshot);
    info!("Snapshot source: {}", snapshot.path().display());

    let (broadcaster, dispatcher) = LogBroadcaster::new(config.broadcast.clone(), snapshot);

    // Start dispatcher
    let (dispatcher_handle, dispatcher_shutdown) = DispatcherHandle::new();
    let dispatcher_task = tokio::spawn(dispatcher.run(dispatcher_shutdown));

    // Create API server
    let (shutdown_tx, _) = watch::channel(false);
    let api_server = ApiServer::new(config.api.clone(), broadcaster);
    let api_shutdown = shutdown_tx.subscribe();

    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!("Server started - API: {}", config.api_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    dispatcher_handle.shutdown();

    let _ = tokio::join!(api_task, dispatcher_task);

    info!("Logcast server stopped");
    Ok(())
}

/// Initialize tracing from the log configuration
fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("logcast={},tower_http=debug", log.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if log.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
