//! Read queries over stored readings.

use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;

use super::models::ReadingRow;

/// Total number of stored readings.
pub async fn count_readings(pool: &SqlitePool) -> Result<i64, DatabaseError> {
    let count: i64 = sqlx::query("SELECT COUNT(*) FROM readings")
        .fetch_one(pool)
        .await?
        .get(0);
    Ok(count)
}

/// The most recently stored readings, newest first.
pub async fn fetch_recent_readings(
    pool: &SqlitePool,
    limit: u32,
) -> Result<Vec<ReadingRow>, DatabaseError> {
    let rows = sqlx::query(
        "SELECT id, value, observed_at_ms, committed_at_ms
         FROM readings
         ORDER BY id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ReadingRow {
            id: row.get("id"),
            value: row.get("value"),
            observed_at_ms: row.get("observed_at_ms"),
            committed_at_ms: row.get("committed_at_ms"),
        })
        .collect())
}
