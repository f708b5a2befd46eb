// Shared test helpers for consumer and store tests.
//
// This module provides common utilities used across multiple test files to reduce duplication.

#![allow(dead_code)] // Each test file uses a different subset

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use reading_ingest::broker::{BrokerChannel, MemoryBroker, QueueClient};
use reading_ingest::ingest::{BatchConsumer, BatchSettings, ConsumerReport};
use reading_ingest::storage::{run_migrations, ReadingStore};
use reading_ingest::{DatabaseError, IngestError, ProcessingStats, Reading};

pub const QUEUE: &str = "sensor data queue";

/// Creates a test database pool with migrations applied.
/// Uses an in-memory database for fast test execution.
pub async fn create_test_pool() -> Arc<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(pool)
}

/// One call to [`ScriptedStore::insert_batch`].
#[derive(Debug, Clone)]
pub struct Attempt {
    pub at: Instant,
    pub values: Vec<f64>,
    pub succeeded: bool,
}

/// In-memory store whose failures are scripted by the test.
///
/// Records every write attempt with the (possibly paused) tokio time at
/// which it started.
#[derive(Default)]
pub struct ScriptedStore {
    failures_left: AtomicUsize,
    always_fail: std::sync::atomic::AtomicBool,
    latency: Mutex<Duration>,
    attempts: Mutex<Vec<Attempt>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails the next `count` writes.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    /// Makes every write take `latency` before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// Values of every successful write, one entry per batch.
    pub fn committed_batches(&self) -> Vec<Vec<f64>> {
        self.attempts()
            .into_iter()
            .filter(|attempt| attempt.succeeded)
            .map(|attempt| attempt.values)
            .collect()
    }

    pub fn committed_values(&self) -> Vec<f64> {
        self.committed_batches().into_iter().flatten().collect()
    }

    fn should_fail(&self) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ReadingStore for ScriptedStore {
    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, DatabaseError> {
        let at = Instant::now();
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let succeeded = !self.should_fail();
        self.attempts.lock().unwrap().push(Attempt {
            at,
            values: readings.iter().map(|reading| reading.value).collect(),
            succeeded,
        });

        if succeeded {
            Ok(readings.len() as u64)
        } else {
            Err(DatabaseError::Unavailable("database is locked".to_string()))
        }
    }
}

/// Settings with the given batch size and timeout and a 5s base retry delay.
pub fn settings(batch_size: usize, batch_timeout: Duration) -> BatchSettings {
    BatchSettings {
        batch_size,
        batch_timeout,
        max_retries: 3,
        retry_delay: Duration::from_secs(5),
        ..Default::default()
    }
}

/// A consumer running against a fresh in-process broker.
pub struct Harness {
    pub broker: MemoryBroker,
    pub stats: Arc<ProcessingStats>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<Result<ConsumerReport, IngestError>>,
}

impl Harness {
    pub async fn start(settings: BatchSettings, store: Arc<dyn ReadingStore>) -> Self {
        Self::start_on(MemoryBroker::new(), settings, store).await
    }

    pub async fn start_on(
        broker: MemoryBroker,
        settings: BatchSettings,
        store: Arc<dyn ReadingStore>,
    ) -> Self {
        broker
            .declare_queue(QUEUE, true)
            .await
            .expect("Failed to declare queue");
        let client = QueueClient::from_channel(Arc::new(broker.clone()));
        let stats = Arc::new(ProcessingStats::new());
        let shutdown = CancellationToken::new();
        let consumer = BatchConsumer::new(client, QUEUE, settings, store, Arc::clone(&stats));
        let task = tokio::spawn(consumer.run(shutdown.clone()));
        // Let the consumer register before the test publishes
        tokio::task::yield_now().await;

        Harness {
            broker,
            stats,
            shutdown,
            task,
        }
    }

    pub async fn publish(&self, values: impl IntoIterator<Item = f64>) {
        for value in values {
            self.publish_raw(value.to_string().into_bytes()).await;
        }
    }

    pub async fn publish_raw(&self, payload: Vec<u8>) {
        let queued = self
            .broker
            .publish(QUEUE, payload, true)
            .await
            .expect("Failed to publish");
        assert!(queued, "publish buffer unexpectedly full");
    }

    /// Cancels the consumer and returns its result.
    pub async fn stop(self) -> Result<ConsumerReport, IngestError> {
        self.shutdown.cancel();
        self.task.await.expect("consumer task panicked")
    }
}

/// Sleeps in small steps until `condition` holds, panicking after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + limit;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn values(range: std::ops::Range<u32>) -> Vec<f64> {
    range.map(f64::from).collect()
}
