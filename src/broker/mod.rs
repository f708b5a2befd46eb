//! Queue client adapter and broker transports.
//!
//! This module provides:
//! - The transport seam ([`BrokerConnector`], [`BrokerChannel`])
//! - [`QueueClient`], the adapter the publisher and consumer talk to
//! - [`MemoryBroker`], an in-process broker with durable queues, prefetch
//!   enforcement, and exactly-once settlement of delivery tags
//!
//! Connection and channel errors are logged and returned; nothing here
//! reconnects on its own.

mod client;
mod memory;
mod types;

pub use client::{Consumer, QueueClient};
pub use memory::{BrokerCounters, MemoryBroker};
pub use types::{BrokerChannel, BrokerConnector, ConsumerEvent, Delivery, DeliveryTag};
