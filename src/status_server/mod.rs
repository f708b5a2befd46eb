//! HTTP status server for monitoring the consumer.
//!
//! Provides three endpoints:
//! - `/` - liveness string
//! - `/metrics` - Prometheus-compatible metrics
//! - `/status` - JSON counters for readings, batches, errors, and warnings
//!
//! The server runs in the background and never blocks consumption.

mod handlers;
mod types;

use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use handlers::{metrics_handler, root_handler, status_handler};
pub use types::StatusState;

/// Routes served by the status server.
pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Binds `127.0.0.1:port` and serves until `shutdown` is cancelled.
pub async fn start_status_server(
    port: u16,
    state: StatusState,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind status server to port {}: {}", port, e))?;

    log::info!("Status server listening on http://127.0.0.1:{}/", port);
    log::info!("  - Metrics: http://127.0.0.1:{}/metrics", port);
    log::info!("  - Status: http://127.0.0.1:{}/status", port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Status server error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ProcessingStats;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_port_in_use_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let state = StatusState::new(Arc::new(ProcessingStats::new()));
        let err = start_status_server(port, state, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to bind status server"));
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let state = StatusState::new(Arc::new(ProcessingStats::new()));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Port 0 picks a free port; the cancelled token ends serving at once.
        let result = start_status_server(0, state, shutdown).await;
        assert!(result.is_ok());
    }
}
