//! reading_ingest library: batched persistence of queued readings
//!
//! This library consumes numeric readings from a durable message queue and
//! writes them to SQLite in bulk batches. A batch is flushed when it reaches
//! the configured size or when the flush timer elapses, whichever comes
//! first. Messages are acknowledged only after their batch is committed;
//! failed commits are retried with exponential backoff and finally rejected
//! without requeue.
//!
//! # Example
//!
//! ```no_run
//! use reading_ingest::broker::MemoryBroker;
//! use reading_ingest::{run_ingest, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     batch_size: 20,
//!     ..Default::default()
//! };
//! let broker = MemoryBroker::new();
//! let shutdown = CancellationToken::new();
//!
//! let report = run_ingest(config, &broker, shutdown).await?;
//! println!("Committed {} readings", report.consumer.committed_readings);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

mod app;
pub mod broker;
pub mod config;
mod error_handling;
pub mod ingest;
pub mod initialization;
mod models;
mod publisher;
mod sensor;
mod status_server;
pub mod storage;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{
    BrokerError, DatabaseError, ErrorType, FailureKind, InfoType, IngestError,
    InitializationError, ProcessingStats, WarningType,
};
pub use models::Reading;
pub use publisher::{LogRelay, ReadingPublisher, ReadingRelay};
pub use run::{run_ingest, IngestReport};
pub use sensor::spawn_sensor;
pub use status_server::{router as status_router, start_status_server, StatusState};

// Internal run module (wires the consumer, the store, and the auxiliary tasks)
mod run {
    use anyhow::{Context, Result};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use log::{info, warn};
    use tokio_util::sync::CancellationToken;

    use crate::app::{print_final_statistics, shutdown_gracefully, spawn_progress_logger};
    use crate::broker::{BrokerConnector, QueueClient};
    use crate::config::{Config, LOGGING_INTERVAL};
    use crate::error_handling::ProcessingStats;
    use crate::ingest::{BatchConsumer, ConsumerReport};
    use crate::initialization::init_store_pool;
    use crate::publisher::{LogRelay, ReadingPublisher};
    use crate::sensor::spawn_sensor;
    use crate::status_server::{start_status_server, StatusState};
    use crate::storage::SqliteReadingStore;

    /// Results of an ingest run.
    #[derive(Debug, Clone)]
    pub struct IngestReport {
        /// Totals reported by the batch consumer
        pub consumer: ConsumerReport,
        /// Readings published by the built-in sensor
        pub readings_published: usize,
        /// Rows in the readings table when the run ended
        pub stored_readings: i64,
        /// Path to the SQLite database holding the readings
        pub db_path: PathBuf,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs the ingest service until `shutdown` is cancelled.
    ///
    /// Opens the database, connects to the broker through `connector`, and
    /// runs the batch consumer. The optional sensor simulator, progress
    /// logger, and status server run alongside and are stopped once the
    /// consumer has drained.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The configuration is invalid
    /// - Database initialization fails
    /// - The broker cannot be reached
    /// - The consumer stops on a broker failure or is cancelled by the broker
    pub async fn run_ingest(
        config: Config,
        connector: &dyn BrokerConnector,
        shutdown: CancellationToken,
    ) -> Result<IngestReport> {
        config.validate().context("Invalid configuration")?;

        let pool = init_store_pool(&config.db_path)
            .await
            .context("Failed to initialize database")?;
        let client = QueueClient::connect(connector, &config.broker_url)
            .await
            .context("Failed to connect to broker")?;
        client
            .declare_queue(&config.queue_name)
            .await
            .context("Failed to declare queue")?;

        let start_time = Instant::now();
        let stats = Arc::new(ProcessingStats::new());
        let aux_cancel = CancellationToken::new();

        let status_task = config.status_port.map(|port| {
            let state = StatusState::new(Arc::clone(&stats));
            let cancel = aux_cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = start_status_server(port, state, cancel).await {
                    warn!("Status server error: {}", e);
                }
            })
        });

        let logging_task = spawn_progress_logger(
            Arc::clone(&stats),
            Duration::from_secs(LOGGING_INTERVAL),
            aux_cancel.clone(),
        );

        let sensor_cancel = shutdown.child_token();
        let sensor_task = if config.no_sensor {
            None
        } else {
            let publisher = ReadingPublisher::new(
                client.clone(),
                config.queue_name.clone(),
                Arc::new(LogRelay),
                Arc::clone(&stats),
            );
            Some(spawn_sensor(
                publisher,
                Duration::from_millis(config.sensor_interval_ms),
                sensor_cancel.clone(),
            ))
        };

        let store = Arc::new(SqliteReadingStore::new(Arc::clone(&pool)));
        let consumer = BatchConsumer::new(
            client,
            config.queue_name.clone(),
            config.batch_settings(),
            store,
            Arc::clone(&stats),
        );
        let consumer_result = consumer.run(shutdown).await;

        // The sensor stops with the consumer, whatever ended it.
        sensor_cancel.cancel();
        if let Some(task) = sensor_task {
            if let Err(e) = task.await {
                warn!("Sensor task ended abnormally: {}", e);
            }
        }
        shutdown_gracefully(aux_cancel, Some(logging_task), status_task).await;

        let consumer_report = consumer_result.context("Batch consumer stopped")?;
        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        let stored_readings =
            print_final_statistics(&pool, &consumer_report, &stats, elapsed_seconds).await?;
        pool.close().await;
        info!("Readings saved in {}", config.db_path.display());

        Ok(IngestReport {
            consumer: consumer_report,
            readings_published: stats.readings_published(),
            stored_readings,
            db_path: config.db_path,
            elapsed_seconds,
        })
    }
}
