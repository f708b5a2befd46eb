//! Upstream side: relays each reading to live viewers and publishes it to
//! the queue for batched persistence.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::broker::QueueClient;
use crate::error_handling::{ProcessingStats, WarningType};
use crate::models::Reading;

/// Real-time fan-out of readings, independent of batching.
///
/// Relays see every submitted reading before it is published. A relay
/// failure is logged and never stops the reading from being published.
#[async_trait]
pub trait ReadingRelay: Send + Sync {
    /// Hands one reading to live viewers.
    async fn relay(&self, reading: &Reading) -> anyhow::Result<()>;
}

/// Relay that logs each reading instead of pushing it to viewers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRelay;

#[async_trait]
impl ReadingRelay for LogRelay {
    async fn relay(&self, reading: &Reading) -> anyhow::Result<()> {
        info!("Reading: {}", reading.value);
        Ok(())
    }
}

/// Entry point for new readings.
#[derive(Clone)]
pub struct ReadingPublisher {
    client: QueueClient,
    queue_name: String,
    relay: Arc<dyn ReadingRelay>,
    stats: Arc<ProcessingStats>,
}

impl ReadingPublisher {
    /// Creates a publisher for `queue_name`.
    pub fn new(
        client: QueueClient,
        queue_name: impl Into<String>,
        relay: Arc<dyn ReadingRelay>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        ReadingPublisher {
            client,
            queue_name: queue_name.into(),
            relay,
            stats,
        }
    }

    /// Relays `value` and publishes it to the queue.
    ///
    /// Returns `false` if the reading could not be queued (send buffer full
    /// or channel closed). The caller may drop or retry it.
    pub async fn submit(&self, value: f64) -> bool {
        let reading = Reading::new(value);
        if let Err(e) = self.relay.relay(&reading).await {
            warn!("Failed to relay reading {}: {:#}", value, e);
        }

        if self.client.publish(&self.queue_name, &reading).await {
            self.stats.record_published();
            debug!("Queued reading {}", value);
            true
        } else {
            self.stats.increment_warning(WarningType::PublishBackpressure);
            false
        }
    }
}
