//! In-process broker.
//!
//! Implements the subset of AMQP queue semantics the consumer relies on:
//! durable named queues, per-channel prefetch, channel-wide delivery tags,
//! exactly-once settlement, requeue to the head of the queue, and consumer
//! cancellation. All state sits behind one mutex; deliveries are pushed to
//! the consumer's channel as soon as prefetch allows.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};
use url::Url;

use crate::config::PUBLISH_BUFFER_CAPACITY;
use crate::error_handling::BrokerError;

use super::types::{BrokerChannel, BrokerConnector, ConsumerEvent, Delivery, DeliveryTag};

const MEMORY_SCHEME: &str = "memory";

/// Settlement and publish counters, for monitoring and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerCounters {
    /// Messages accepted by `publish`
    pub published: usize,
    /// Publishes refused because the send buffer was full
    pub refused: usize,
    /// Deliveries pushed to consumers, redeliveries included
    pub delivered: usize,
    /// Messages acknowledged
    pub acked: usize,
    /// Nacked without requeue
    pub rejected: usize,
    /// Nacked with requeue
    pub requeued: usize,
}

struct StoredMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

struct Unacked {
    queue: String,
    message: StoredMessage,
}

#[derive(Default)]
struct QueueState {
    durable: bool,
    ready: VecDeque<StoredMessage>,
    consumer: Option<mpsc::UnboundedSender<ConsumerEvent>>,
}

struct BrokerState {
    reachable: bool,
    publish_capacity: usize,
    prefetch: u16,
    next_tag: DeliveryTag,
    queues: HashMap<String, QueueState>,
    unacked: BTreeMap<DeliveryTag, Unacked>,
    counters: BrokerCounters,
}

impl BrokerState {
    fn queue_mut(&mut self, name: &str) -> Result<&mut QueueState, BrokerError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| BrokerError::QueueNotFound(name.to_string()))
    }

    fn ensure_reachable(&self) -> Result<(), BrokerError> {
        if self.reachable {
            Ok(())
        } else {
            Err(BrokerError::ChannelError("connection closed".to_string()))
        }
    }

    /// Pushes ready messages to the queue's consumer while prefetch allows.
    fn dispatch(&mut self, name: &str) {
        let BrokerState {
            prefetch,
            next_tag,
            queues,
            unacked,
            counters,
            ..
        } = self;
        let Some(queue) = queues.get_mut(name) else {
            return;
        };

        loop {
            if *prefetch > 0 && unacked.len() >= usize::from(*prefetch) {
                break;
            }
            let Some(sender) = queue.consumer.as_ref() else {
                break;
            };
            let Some(message) = queue.ready.pop_front() else {
                break;
            };

            *next_tag += 1;
            let tag = *next_tag;
            let delivery = Delivery {
                tag,
                payload: message.payload.clone(),
                redelivered: message.redelivered,
            };
            if sender.send(ConsumerEvent::Delivery(delivery)).is_err() {
                debug!("Consumer on {} went away, keeping message ready", name);
                queue.ready.push_front(message);
                queue.consumer = None;
                break;
            }
            counters.delivered += 1;
            unacked.insert(
                tag,
                Unacked {
                    queue: name.to_string(),
                    message,
                },
            );
        }
    }

    fn dispatch_all(&mut self) {
        let names: Vec<String> = self.queues.keys().cloned().collect();
        for name in names {
            self.dispatch(&name);
        }
    }

    fn settle(&mut self, tag: DeliveryTag) -> Result<Unacked, BrokerError> {
        self.ensure_reachable()?;
        self.unacked
            .remove(&tag)
            .ok_or(BrokerError::UnknownDeliveryTag(tag))
    }
}

/// In-process broker; acts as its own connector and channel.
///
/// Clones share state, so a test can keep a handle to inspect counters while
/// the consumer owns another.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Creates a broker with the default publish buffer capacity.
    pub fn new() -> Self {
        Self::with_publish_capacity(PUBLISH_BUFFER_CAPACITY)
    }

    /// Creates a broker whose queues hold at most `capacity` ready messages
    /// before `publish` reports backpressure.
    pub fn with_publish_capacity(capacity: usize) -> Self {
        MemoryBroker {
            state: Arc::new(Mutex::new(BrokerState {
                reachable: true,
                publish_capacity: capacity,
                prefetch: 0,
                next_tag: 0,
                queues: HashMap::new(),
                unacked: BTreeMap::new(),
                counters: BrokerCounters::default(),
            })),
        }
    }

    /// Simulates the broker going away or coming back.
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.reachable = reachable;
    }

    /// Cancels the consumer on `queue`, as a broker does when the queue is
    /// deleted. Unacknowledged deliveries stay outstanding.
    pub async fn cancel_consumer(&self, queue: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let queue_state = state.queue_mut(queue)?;
        if let Some(sender) = queue_state.consumer.take() {
            let _ = sender.send(ConsumerEvent::Cancelled);
        }
        Ok(())
    }

    /// Ready and unacknowledged message counts for `queue`.
    pub async fn queue_depth(&self, queue: &str) -> Option<(usize, usize)> {
        let state = self.state.lock().await;
        let ready = state.queues.get(queue)?.ready.len();
        let unacked = state.unacked.values().filter(|u| u.queue == queue).count();
        Some((ready, unacked))
    }

    /// Prefetch limit currently set on the channel.
    pub async fn prefetch(&self) -> u16 {
        self.state.lock().await.prefetch
    }

    /// Snapshot of the publish and settlement counters.
    pub async fn counters(&self) -> BrokerCounters {
        self.state.lock().await.counters
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self, url: &Url) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        if url.scheme() != MEMORY_SCHEME {
            return Err(BrokerError::ConnectionError(format!(
                "no transport for scheme '{}' (this connector serves {}://)",
                url.scheme(),
                MEMORY_SCHEME
            )));
        }
        if !self.state.lock().await.reachable {
            return Err(BrokerError::ConnectionError(format!(
                "broker at {url} is unreachable"
            )));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BrokerChannel for MemoryBroker {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        state.ensure_reachable()?;
        match state.queues.get(name) {
            Some(existing) if existing.durable != durable => {
                Err(BrokerError::ChannelError(format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{name}'"
                )))
            }
            Some(_) => Ok(()),
            None => {
                state.queues.insert(
                    name.to_string(),
                    QueueState {
                        durable,
                        ..Default::default()
                    },
                );
                Ok(())
            }
        }
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        state.ensure_reachable()?;
        state.prefetch = count;
        state.dispatch_all();
        Ok(())
    }

    async fn publish(
        &self,
        queue: &str,
        payload: Vec<u8>,
        _persistent: bool,
    ) -> Result<bool, BrokerError> {
        let mut state = self.state.lock().await;
        state.ensure_reachable()?;
        let capacity = state.publish_capacity;
        let queue_state = state.queue_mut(queue)?;
        if queue_state.ready.len() >= capacity {
            state.counters.refused += 1;
            return Ok(false);
        }
        queue_state.ready.push_back(StoredMessage {
            payload,
            redelivered: false,
        });
        state.counters.published += 1;
        state.dispatch(queue);
        Ok(true)
    }

    async fn consume(
        &self,
        queue: &str,
    ) -> Result<mpsc::UnboundedReceiver<ConsumerEvent>, BrokerError> {
        let mut state = self.state.lock().await;
        state.ensure_reachable()?;
        let queue_state = state.queue_mut(queue)?;
        if queue_state
            .consumer
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
        {
            return Err(BrokerError::ConsumerExists(queue.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        queue_state.consumer = Some(tx);
        state.dispatch(queue);
        Ok(rx)
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let settled = state.settle(tag)?;
        state.counters.acked += 1;
        state.dispatch(&settled.queue);
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let settled = state.settle(tag)?;
        if requeue {
            state.counters.requeued += 1;
            if let Ok(queue_state) = state.queue_mut(&settled.queue) {
                queue_state.ready.push_front(StoredMessage {
                    payload: settled.message.payload,
                    redelivered: true,
                });
            }
        } else {
            // Dead-letter routing, if any, belongs to the broker's policy.
            warn!("Message {} rejected without requeue", tag);
            state.counters.rejected += 1;
        }
        state.dispatch(&settled.queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: &str = "readings";

    async fn broker_with_queue() -> MemoryBroker {
        let broker = MemoryBroker::new();
        broker.declare_queue(QUEUE, true).await.unwrap();
        broker
    }

    fn expect_delivery(event: Option<ConsumerEvent>) -> Delivery {
        match event {
            Some(ConsumerEvent::Delivery(delivery)) => delivery,
            other => panic!("expected a delivery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_requires_declared_queue() {
        let broker = MemoryBroker::new();
        let err = broker.publish("missing", b"1".to_vec(), true).await;
        assert_eq!(err, Err(BrokerError::QueueNotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_publish_reports_backpressure_when_full() {
        let broker = MemoryBroker::with_publish_capacity(2);
        broker.declare_queue(QUEUE, true).await.unwrap();

        assert_eq!(broker.publish(QUEUE, b"1".to_vec(), true).await, Ok(true));
        assert_eq!(broker.publish(QUEUE, b"2".to_vec(), true).await, Ok(true));
        assert_eq!(broker.publish(QUEUE, b"3".to_vec(), true).await, Ok(false));
        assert_eq!(broker.counters().await.refused, 1);
        assert_eq!(broker.queue_depth(QUEUE).await, Some((2, 0)));
    }

    #[tokio::test]
    async fn test_prefetch_limits_outstanding_deliveries() {
        let broker = broker_with_queue().await;
        broker.set_prefetch(2).await.unwrap();
        for i in 0..5 {
            broker
                .publish(QUEUE, i.to_string().into_bytes(), true)
                .await
                .unwrap();
        }

        let mut rx = broker.consume(QUEUE).await.unwrap();
        let first = expect_delivery(rx.recv().await);
        let _second = expect_delivery(rx.recv().await);
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.queue_depth(QUEUE).await, Some((3, 2)));

        broker.ack(first.tag).await.unwrap();
        let third = expect_delivery(rx.recv().await);
        assert_eq!(third.payload, b"2".to_vec());
    }

    #[tokio::test]
    async fn test_settlement_is_exactly_once() {
        let broker = broker_with_queue().await;
        let mut rx = broker.consume(QUEUE).await.unwrap();
        broker.publish(QUEUE, b"1".to_vec(), true).await.unwrap();
        let delivery = expect_delivery(rx.recv().await);

        broker.ack(delivery.tag).await.unwrap();
        assert_eq!(
            broker.ack(delivery.tag).await,
            Err(BrokerError::UnknownDeliveryTag(delivery.tag))
        );
        assert_eq!(
            broker.nack(delivery.tag, false).await,
            Err(BrokerError::UnknownDeliveryTag(delivery.tag))
        );
        assert_eq!(broker.counters().await.acked, 1);
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers_at_head() {
        let broker = broker_with_queue().await;
        broker.set_prefetch(1).await.unwrap();
        broker.publish(QUEUE, b"1".to_vec(), true).await.unwrap();
        broker.publish(QUEUE, b"2".to_vec(), true).await.unwrap();

        let mut rx = broker.consume(QUEUE).await.unwrap();
        let first = expect_delivery(rx.recv().await);
        broker.nack(first.tag, true).await.unwrap();

        let again = expect_delivery(rx.recv().await);
        assert_eq!(again.payload, b"1".to_vec());
        assert!(again.redelivered);
        assert_ne!(again.tag, first.tag);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops_message() {
        let broker = broker_with_queue().await;
        let mut rx = broker.consume(QUEUE).await.unwrap();
        broker.publish(QUEUE, b"1".to_vec(), true).await.unwrap();
        let delivery = expect_delivery(rx.recv().await);

        broker.nack(delivery.tag, false).await.unwrap();
        assert_eq!(broker.queue_depth(QUEUE).await, Some((0, 0)));
        assert_eq!(broker.counters().await.rejected, 1);
    }

    #[tokio::test]
    async fn test_cancel_consumer_sends_sentinel() {
        let broker = broker_with_queue().await;
        let mut rx = broker.consume(QUEUE).await.unwrap();
        broker.cancel_consumer(QUEUE).await.unwrap();

        assert_eq!(rx.recv().await, Some(ConsumerEvent::Cancelled));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_second_consumer_rejected_while_first_active() {
        let broker = broker_with_queue().await;
        let _rx = broker.consume(QUEUE).await.unwrap();
        assert_eq!(
            broker.consume(QUEUE).await.err(),
            Some(BrokerError::ConsumerExists(QUEUE.to_string()))
        );
    }

    #[tokio::test]
    async fn test_redeclare_with_different_durability_fails() {
        let broker = broker_with_queue().await;
        assert!(broker.declare_queue(QUEUE, true).await.is_ok());
        assert!(matches!(
            broker.declare_queue(QUEUE, false).await,
            Err(BrokerError::ChannelError(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_foreign_scheme_and_unreachable_broker() {
        let broker = MemoryBroker::new();
        let amqp = Url::parse("amqp://localhost:5672").unwrap();
        assert!(matches!(
            broker.connect(&amqp).await,
            Err(BrokerError::ConnectionError(_))
        ));

        broker.set_reachable(false).await;
        let memory = Url::parse("memory://localhost").unwrap();
        assert!(matches!(
            broker.connect(&memory).await,
            Err(BrokerError::ConnectionError(_))
        ));
    }
}
