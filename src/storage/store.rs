//! Bulk persistence of readings.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::INSERT_CHUNK_ROWS;
use crate::error_handling::DatabaseError;
use crate::models::Reading;

/// Destination for committed batches.
///
/// `insert_batch` receives readings in arrival order. It must either store
/// all of them or none, so the same sequence can be written again when the
/// consumer retries.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Stores every reading and returns the number of rows written.
    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, DatabaseError>;
}

/// Writes readings to the `readings` table.
///
/// A batch is written in one transaction, in chunks of `INSERT_CHUNK_ROWS`
/// rows per statement.
#[derive(Clone)]
pub struct SqliteReadingStore {
    pool: Arc<SqlitePool>,
}

impl SqliteReadingStore {
    /// Creates a store over an open pool with migrations applied.
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        SqliteReadingStore { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReadingStore for SqliteReadingStore {
    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, DatabaseError> {
        if readings.is_empty() {
            return Ok(0);
        }

        let committed_at_ms = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in readings.chunks(INSERT_CHUNK_ROWS) {
            let mut query_builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO readings (value, observed_at_ms, committed_at_ms) ",
            );
            query_builder.push_values(chunk, |mut row, reading| {
                row.push_bind(reading.value)
                    .push_bind(reading.observed_at_ms)
                    .push_bind(committed_at_ms);
            });
            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Inserted {} readings", inserted);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::query::{count_readings, fetch_recent_readings};
    use crate::storage::test_helpers::create_test_pool;

    fn readings(values: impl IntoIterator<Item = f64>) -> Vec<Reading> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Reading {
                value,
                observed_at_ms: 1_700_000_000_000 + i as i64,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_insert_batch_preserves_order() {
        let pool = create_test_pool().await;
        let store = SqliteReadingStore::new(Arc::clone(&pool));

        let inserted = store
            .insert_batch(&readings([4.0, 8.0, 15.0]))
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let rows = fetch_recent_readings(&pool, 10).await.unwrap();
        let values: Vec<f64> = rows.iter().rev().map(|row| row.value).collect();
        assert_eq!(values, vec![4.0, 8.0, 15.0]);
        assert!(rows.iter().all(|row| row.committed_at_ms > 0));
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let pool = create_test_pool().await;
        let store = SqliteReadingStore::new(Arc::clone(&pool));
        assert_eq!(store.insert_batch(&[]).await.unwrap(), 0);
        assert_eq!(count_readings(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_large_batch_spans_several_statements() {
        let pool = create_test_pool().await;
        let store = SqliteReadingStore::new(Arc::clone(&pool));
        let total = INSERT_CHUNK_ROWS * 2 + 7;

        let batch = readings((0..total).map(|i| i as f64));
        assert_eq!(store.insert_batch(&batch).await.unwrap(), total as u64);
        assert_eq!(count_readings(&pool).await.unwrap(), total as i64);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_rows() {
        let pool = create_test_pool().await;
        let store = SqliteReadingStore::new(Arc::clone(&pool));

        // NaN binds as NULL, which the NOT NULL constraint rejects.
        let batch = readings([1.0, 2.0, f64::NAN]);
        assert!(store.insert_batch(&batch).await.is_err());
        assert_eq!(count_readings(&pool).await.unwrap(), 0);

        store.insert_batch(&readings([1.0, 2.0])).await.unwrap();
        assert_eq!(count_readings(&pool).await.unwrap(), 2);
    }
}
