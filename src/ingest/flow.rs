//! Flow control: broker prefetch and the optional local buffer bound.

use log::info;

use crate::broker::QueueClient;
use crate::error_handling::BrokerError;

/// Bounds how many unacknowledged deliveries the consumer can hold.
#[derive(Debug, Clone)]
pub struct FlowController {
    batch_size: usize,
    prefetch_multiplier: u16,
    max_buffer_multiple: Option<usize>,
}

impl FlowController {
    /// Creates a controller for the given batch size and multipliers.
    pub fn new(
        batch_size: usize,
        prefetch_multiplier: u16,
        max_buffer_multiple: Option<usize>,
    ) -> Self {
        FlowController {
            batch_size,
            prefetch_multiplier,
            max_buffer_multiple,
        }
    }

    /// `prefetch_multiplier * batch_size`, saturating at the protocol limit.
    pub fn prefetch_count(&self) -> u16 {
        u16::try_from(self.batch_size)
            .unwrap_or(u16::MAX)
            .saturating_mul(self.prefetch_multiplier)
    }

    /// Sets the prefetch limit on the channel. Called before consuming.
    pub async fn apply(&self, client: &QueueClient) -> Result<(), BrokerError> {
        let prefetch = self.prefetch_count();
        client.set_prefetch(prefetch).await?;
        info!(
            "Prefetch set to {} ({} x batch size {})",
            prefetch, self.prefetch_multiplier, self.batch_size
        );
        Ok(())
    }

    /// Number of buffered readings at which consumption pauses, if bounded.
    pub fn buffer_limit(&self) -> Option<usize> {
        self.max_buffer_multiple
            .map(|multiple| multiple.saturating_mul(self.batch_size))
    }

    /// Whether consumption should pause at this buffer length.
    pub fn should_pause(&self, buffered: usize) -> bool {
        self.buffer_limit().is_some_and(|limit| buffered >= limit)
    }
}
