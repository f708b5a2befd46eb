//! The batch consumer actor.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::broker::{ConsumerEvent, Delivery, DeliveryTag, QueueClient};
use crate::error_handling::{
    classify, update_error_stats, BrokerError, DatabaseError, ErrorType, FailureKind, InfoType,
    IngestError, ProcessingStats, WarningType,
};
use crate::models::Reading;
use crate::storage::ReadingStore;

use super::buffer::{IngestionBuffer, PendingReading};
use super::committer::{BatchCommitter, CommitOutcome};
use super::flow::FlowController;
use super::scheduler::BatchScheduler;
use super::BatchSettings;

/// Totals for one consumer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Batches written and acknowledged, including the final flush
    pub committed_batches: usize,
    /// Readings written and acknowledged
    pub committed_readings: usize,
    /// Readings rejected without requeue after retries were exhausted
    pub rejected_readings: usize,
    /// Readings requeued because the final flush on shutdown failed
    pub requeued_readings: usize,
    /// Messages rejected because the body was not a reading
    pub malformed_messages: usize,
    /// Failed commit attempts that were scheduled for retry
    pub retries: usize,
}

#[derive(Debug, Clone, Copy)]
enum Settle {
    Ack,
    Nack { requeue: bool },
}

/// Consumes readings from one queue and commits them in batches.
///
/// Owns the buffer, the flush timer, and the commit state. Everything runs
/// on the task that calls [`run`](Self::run); store writes are the only
/// work spawned elsewhere.
pub struct BatchConsumer {
    client: QueueClient,
    queue_name: String,
    settings: BatchSettings,
    buffer: IngestionBuffer,
    scheduler: BatchScheduler,
    committer: BatchCommitter,
    flow: FlowController,
    stats: Arc<ProcessingStats>,
    report: ConsumerReport,
    draining: bool,
}

impl BatchConsumer {
    /// Creates a consumer for `queue_name`.
    ///
    /// A `batch_size` of zero is raised to one; every other setting is used
    /// as given.
    pub fn new(
        client: QueueClient,
        queue_name: impl Into<String>,
        mut settings: BatchSettings,
        store: Arc<dyn ReadingStore>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        if settings.batch_size == 0 {
            warn!("Batch size 0 is not usable, flushing every reading instead");
            settings.batch_size = 1;
        }
        let scheduler = BatchScheduler::new(settings.batch_size, settings.batch_timeout);
        let committer = BatchCommitter::new(store, settings.max_retries, settings.retry_delay);
        let flow = FlowController::new(
            settings.batch_size,
            settings.prefetch_multiplier,
            settings.max_buffer_multiple,
        );
        BatchConsumer {
            client,
            queue_name: queue_name.into(),
            settings,
            buffer: IngestionBuffer::new(),
            scheduler,
            committer,
            flow,
            stats,
            report: ConsumerReport::default(),
            draining: false,
        }
    }

    /// Declares the queue, sets the prefetch limit, and consumes until
    /// `shutdown` is cancelled or the broker ends the consumer.
    ///
    /// On shutdown and on broker cancellation the consumer drains before
    /// returning: it waits for an outstanding write, drops any pending retry,
    /// and writes everything still buffered in one final batch. Readings of a
    /// failed final batch are requeued.
    ///
    /// # Errors
    ///
    /// - `IngestError::ConsumerCancelled` if the broker cancelled the consumer
    /// - `IngestError::Broker` on a connection or channel failure; nothing is
    ///   drained since the channel is gone
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ConsumerReport, IngestError> {
        self.client.declare_queue(&self.queue_name).await?;
        self.flow.apply(&self.client).await?;
        let mut consumer = self.client.consume(&self.queue_name).await?;
        info!(
            "Consuming from '{}' (batch size {}, flush after {:?}, {} retries from {:?})",
            self.queue_name,
            self.settings.batch_size,
            self.settings.batch_timeout,
            self.settings.max_retries,
            self.settings.retry_delay
        );

        let mut paused = false;
        let ended: Result<(), IngestError> = loop {
            let should_pause = self.flow.should_pause(self.buffer.len());
            if should_pause != paused {
                paused = should_pause;
                if paused {
                    warn!(
                        "Buffer holds {} readings, pausing consumption until a commit drains it",
                        self.buffer.len()
                    );
                    self.stats.increment_warning(WarningType::BufferLimitReached);
                } else {
                    info!("Resuming consumption");
                }
            }

            let flush_at = self.scheduler.deadline();
            let retry_at = self.committer.retry_deadline();

            let step = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, draining consumer");
                    break Ok(());
                }
                result = self.committer.wait_write() => self.on_commit_result(result).await,
                _ = sleep_until_opt(retry_at) => {
                    self.on_retry_timer();
                    Ok(())
                }
                _ = sleep_until_opt(flush_at) => {
                    self.on_flush_timer();
                    Ok(())
                }
                event = consumer.next(), if !paused => match event {
                    Some(ConsumerEvent::Delivery(delivery)) => self.on_delivery(delivery).await,
                    Some(ConsumerEvent::Cancelled) => {
                        warn!("Consumer on '{}' was cancelled by the broker", self.queue_name);
                        self.stats.increment_info(InfoType::ConsumerCancelled);
                        break Err(IngestError::ConsumerCancelled);
                    }
                    None => Err(BrokerError::ChannelError(
                        "consumer stream closed".to_string(),
                    )
                    .into()),
                },
            };

            if let Err(e) = step {
                error!("Consumer on '{}' stopped: {}", self.queue_name, e);
                return Err(e);
            }
        };

        self.drain().await?;
        ended.map(|()| self.report)
    }

    async fn on_delivery(&mut self, delivery: Delivery) -> Result<(), IngestError> {
        let Delivery { tag, payload, .. } = delivery;
        let reading = match Reading::from_payload(&payload) {
            Ok(reading) => reading,
            Err(source) => {
                let err = IngestError::MalformedMessage { tag, source };
                update_error_stats(
                    &self.stats,
                    classify(&err, 0, self.settings.max_retries),
                );
                warn!(
                    "Rejecting {}: {:?}",
                    err,
                    String::from_utf8_lossy(&payload)
                );
                self.report.malformed_messages += 1;
                return self.settle(tag, Settle::Nack { requeue: false }).await;
            }
        };

        let became_non_empty = self.buffer.push(PendingReading { reading, tag });
        self.stats.set_buffered(self.buffer.len());
        if self.scheduler.on_arrival(became_non_empty, self.buffer.len()) {
            self.try_capture(InfoType::FlushBySize);
        }
        Ok(())
    }

    fn on_flush_timer(&mut self) {
        self.scheduler.clear();
        self.try_capture(InfoType::FlushByTimeout);
    }

    /// Captures everything buffered as one batch and starts writing it,
    /// unless a commit is already in flight.
    fn try_capture(&mut self, trigger: InfoType) {
        if self.committer.is_busy() {
            debug!(
                "{} skipped, commit in flight ({} readings buffered)",
                trigger.as_str(),
                self.buffer.len()
            );
            self.stats.increment_info(InfoType::FlushSkippedInFlight);
            return;
        }
        self.scheduler.clear();
        if self.buffer.is_empty() {
            return;
        }

        let batch = self.buffer.take_all();
        debug!("{}: captured {} readings", trigger.as_str(), batch.len());
        self.stats.increment_info(trigger);
        self.stats.set_buffered(0);
        self.committer.begin(batch, 0);
    }

    fn on_retry_timer(&mut self) {
        let Some((attempt, batch_len)) = self.committer.take_retry() else {
            return;
        };
        let batch = self.buffer.take_front(batch_len);
        info!(
            "Retrying batch of {} readings (attempt {} of {})",
            batch.len(),
            attempt + 1,
            self.settings.max_retries + 1
        );
        self.stats.set_buffered(self.buffer.len());
        self.committer.begin(batch, attempt);
    }

    async fn on_commit_result(
        &mut self,
        result: Result<u64, DatabaseError>,
    ) -> Result<(), IngestError> {
        let Some(outcome) = self.committer.resolve(result) else {
            return Ok(());
        };

        match outcome {
            CommitOutcome::Committed { batch, attempt } => {
                for tag in batch.tags() {
                    self.settle(tag, Settle::Ack).await?;
                }
                self.stats.record_committed(batch.len());
                self.stats.increment_info(InfoType::BatchCommitted);
                self.report.committed_batches += 1;
                self.report.committed_readings += batch.len();
                if attempt > 0 {
                    info!(
                        "Committed batch of {} readings on attempt {}",
                        batch.len(),
                        attempt + 1
                    );
                } else {
                    info!("Committed batch of {} readings", batch.len());
                }
            }
            CommitOutcome::Retry {
                batch,
                next_attempt,
                delay,
                error,
            } => {
                update_error_stats(&self.stats, FailureKind::Transient);
                self.stats.increment_info(InfoType::BatchRetried);
                self.report.retries += 1;
                warn!(
                    "Failed to commit batch of {} readings (attempt {} of {}): {}. Retrying in {:?}",
                    batch.len(),
                    next_attempt,
                    self.settings.max_retries + 1,
                    error,
                    delay
                );
                self.buffer.prepend(batch);
                self.stats.set_buffered(self.buffer.len());
                return Ok(());
            }
            CommitOutcome::Rejected {
                batch,
                attempts,
                error,
            } => {
                update_error_stats(&self.stats, FailureKind::Permanent);
                error!(
                    "Giving up on batch of {} readings after {} attempts: {}. Lost data: {:?}",
                    batch.len(),
                    attempts,
                    error,
                    batch.values()
                );
                for tag in batch.tags() {
                    self.settle(tag, Settle::Nack { requeue: false }).await?;
                }
                self.stats.record_rejected(batch.len());
                self.report.rejected_readings += batch.len();
            }
        }

        self.reevaluate();
        Ok(())
    }

    /// Gives readings that arrived during a commit a flush trigger.
    fn reevaluate(&mut self) {
        if self.draining || self.committer.is_busy() || self.buffer.is_empty() {
            return;
        }
        if self.scheduler.size_reached(self.buffer.len()) {
            self.try_capture(InfoType::FlushBySize);
        } else {
            self.scheduler.arm();
        }
    }

    async fn drain(&mut self) -> Result<(), IngestError> {
        self.draining = true;
        self.scheduler.clear();

        while self.committer.is_writing() {
            let result = self.committer.wait_write().await;
            self.on_commit_result(result).await?;
        }
        if self.committer.abandon_retry() {
            info!("Cancelled pending retry");
        }
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = self.buffer.take_all();
        self.stats.set_buffered(0);
        info!("Final flush of {} buffered readings", batch.len());
        match self.committer.store().insert_batch(&batch.readings()).await {
            Ok(_) => {
                for tag in batch.tags() {
                    self.settle(tag, Settle::Ack).await?;
                }
                self.stats.record_committed(batch.len());
                self.stats.increment_info(InfoType::BatchCommitted);
                self.report.committed_batches += 1;
                self.report.committed_readings += batch.len();
            }
            Err(e) => {
                warn!(
                    "Final flush of {} readings failed: {}. Requeueing for redelivery",
                    batch.len(),
                    e
                );
                self.stats.increment_error(ErrorType::StoreWriteFailure);
                self.stats.increment_warning(WarningType::ShutdownRequeue);
                for tag in batch.tags() {
                    self.settle(tag, Settle::Nack { requeue: true }).await?;
                }
                self.report.requeued_readings += batch.len();
            }
        }
        Ok(())
    }

    /// Acks or nacks one message.
    ///
    /// A tag the broker does not know is logged and counted; any other broker
    /// failure ends the consumer.
    async fn settle(&mut self, tag: DeliveryTag, settle: Settle) -> Result<(), IngestError> {
        let result = match settle {
            Settle::Ack => self.client.ack(tag).await,
            Settle::Nack { requeue } => self.client.nack(tag, requeue).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(e @ BrokerError::UnknownDeliveryTag(_)) => {
                error!("Failed to {:?} message: {}", settle, e);
                self.stats.increment_error(ErrorType::SettleFailure);
                Ok(())
            }
            Err(e) => {
                let err = IngestError::Broker(e);
                update_error_stats(&self.stats, classify(&err, 0, self.settings.max_retries));
                Err(err)
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
