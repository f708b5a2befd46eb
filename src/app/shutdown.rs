//! Graceful shutdown handling.

use log::warn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stops the background tasks that outlive the consumer.
///
/// The consumer drains on its own when the shutdown token fires; this only
/// cancels the auxiliary tasks (progress logging, status server) and waits
/// for them to finish.
pub async fn shutdown_gracefully(
    cancel: CancellationToken,
    logging_task: Option<JoinHandle<()>>,
    status_task: Option<JoinHandle<()>>,
) {
    cancel.cancel();
    for task in [logging_task, status_task].into_iter().flatten() {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
}
