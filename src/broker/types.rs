//! Broker transport traits and delivery types.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error_handling::BrokerError;

/// Opaque broker-issued identifier of one delivered message.
pub type DeliveryTag = u64;

/// One message delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Settles this message through ack or nack
    pub tag: DeliveryTag,
    /// Raw message body
    pub payload: Vec<u8>,
    /// Set when the message was requeued after an earlier delivery
    pub redelivered: bool,
}

/// Events on a consumer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// A message was delivered.
    Delivery(Delivery),
    /// The broker cancelled the consumer; no further deliveries follow.
    Cancelled,
}

/// An open channel to a broker.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Ensures the named queue exists.
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError>;

    /// Limits unacknowledged deliveries on this channel (0 = unlimited).
    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    /// Enqueues a message. `Ok(false)` means the send buffer is full.
    async fn publish(
        &self,
        queue: &str,
        payload: Vec<u8>,
        persistent: bool,
    ) -> Result<bool, BrokerError>;

    /// Registers a consumer on the queue.
    async fn consume(
        &self,
        queue: &str,
    ) -> Result<mpsc::UnboundedReceiver<ConsumerEvent>, BrokerError>;

    /// Acknowledges a delivery; each tag settles once.
    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError>;

    /// Rejects a delivery, optionally returning it to the head of its queue.
    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError>;
}

/// Opens channels to a broker addressed by URL.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Connects to the broker at `url` and opens a channel.
    async fn connect(&self, url: &Url) -> Result<Arc<dyn BrokerChannel>, BrokerError>;
}
