//! Axum server setup and startup

use std::net::SocketAddr;

use tower_http::cors::{Any, CorsLayer};

use super::routes::create_router;
use super::shared::SharedStateHandle;

/// Run the API server with shared state
///
/// Listens on `0.0.0.0` at the configured port and returns once the
/// shutdown signal fires and in-flight requests have drained.
pub async fn run_server(
    shared_state: SharedStateHandle,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Front-ends are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let port = shared_state.config.port;
    let uploads_dir = shared_state.config.uploads_dir.clone();
    let read_only = shared_state.config.read_only;
    let app = create_router(shared_state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    log::info!("API server listening on http://{}", addr);
    if read_only {
        log::info!("Read-only deployment: uploads are returned inline and not persisted");
    } else {
        log::info!("Serving uploads from {}", uploads_dir.display());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            log::info!("API server shutting down gracefully");
        })
        .await
}
