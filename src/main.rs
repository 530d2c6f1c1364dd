//! Border Maker - Main Entry Point
//!
//! Loads configuration, initializes logging and runs the HTTP API until Ctrl+C.

use border_maker::api::{create_shared_state, run_server};
use border_maker::telemetry::{init_logging, LogConfig};
use border_maker::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&LogConfig::from_env())?;

    let config = ServerConfig::load()?;
    tracing::info!(
        port = config.port,
        uploads_dir = %config.uploads_dir.display(),
        state_dir = %config.state_dir.display(),
        read_only = config.read_only,
        "Configuration loaded"
    );

    let state = create_shared_state(config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    run_server(state, shutdown_rx).await?;
    tracing::info!("Border Maker stopped");
    Ok(())
}
