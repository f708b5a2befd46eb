//! Queue client adapter.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use url::Url;

use crate::error_handling::BrokerError;
use crate::models::Reading;

use super::types::{BrokerChannel, BrokerConnector, ConsumerEvent, DeliveryTag};

/// Adapter over one broker channel.
///
/// Cloning is cheap; clones share the underlying channel, so the publisher
/// and the consumer can use the same connection.
#[derive(Clone)]
pub struct QueueClient {
    channel: Arc<dyn BrokerChannel>,
    broker_url: String,
}

impl QueueClient {
    /// Establishes the broker connection and opens a channel.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::ConnectionError` if the URL is invalid or the
    /// broker cannot be reached.
    pub async fn connect(
        connector: &dyn BrokerConnector,
        broker_url: &str,
    ) -> Result<Self, BrokerError> {
        info!("Connecting to broker at {}", broker_url);
        let url = Url::parse(broker_url).map_err(|e| {
            error!("Invalid broker URL {}: {}", broker_url, e);
            BrokerError::ConnectionError(format!("invalid broker URL {broker_url}: {e}"))
        })?;

        let channel = connector.connect(&url).await.map_err(|e| {
            error!("Failed to connect to broker: {}", e);
            e
        })?;
        info!("Broker channel created");

        Ok(QueueClient {
            channel,
            broker_url: broker_url.to_string(),
        })
    }

    /// Wraps an already open channel.
    pub fn from_channel(channel: Arc<dyn BrokerChannel>) -> Self {
        QueueClient {
            channel,
            broker_url: String::new(),
        }
    }

    /// URL the client connected to; empty for a wrapped channel.
    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    /// Ensures a durable queue with this name exists.
    pub async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.channel.declare_queue(name, true).await.map_err(|e| {
            error!("Failed to declare queue {}: {}", name, e);
            e
        })?;
        info!("Queue declared: {}", name);
        Ok(())
    }

    /// Limits unacknowledged deliveries to `count`.
    pub async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.channel.set_prefetch(count).await.map_err(|e| {
            error!("Failed to set prefetch to {}: {}", count, e);
            e
        })
    }

    /// Publishes a reading as a persistent message.
    ///
    /// Returns `false` without failing when the reading could not be queued:
    /// the send buffer is full, the channel is gone, or encoding failed.
    pub async fn publish(&self, queue: &str, reading: &Reading) -> bool {
        let payload = match reading.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode reading {}: {}", reading.value, e);
                return false;
            }
        };

        match self.channel.publish(queue, payload, true).await {
            Ok(true) => {
                debug!("Published reading {} to {}", reading.value, queue);
                true
            }
            Ok(false) => {
                warn!("Reading could not be sent (channel buffer full)");
                false
            }
            Err(e) => {
                error!("Error publishing to queue {}: {}", queue, e);
                false
            }
        }
    }

    /// Registers a consumer on the queue.
    pub async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError> {
        let events = self.channel.consume(queue).await.map_err(|e| {
            error!("Failed to start consumer on {}: {}", queue, e);
            e
        })?;
        Ok(Consumer { events })
    }

    /// Acknowledges one delivery.
    pub async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError> {
        self.channel.ack(tag).await
    }

    /// Rejects one delivery, requeueing it if `requeue` is set.
    pub async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError> {
        self.channel.nack(tag, requeue).await
    }
}

/// Stream of consumer events from one registration.
pub struct Consumer {
    events: mpsc::UnboundedReceiver<ConsumerEvent>,
}

impl Consumer {
    /// Next event, or `None` once the channel has closed.
    ///
    /// Cancel-safe: dropping the future never loses an event.
    pub async fn next(&mut self) -> Option<ConsumerEvent> {
        self.events.recv().await
    }
}
