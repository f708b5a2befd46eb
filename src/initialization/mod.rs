//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger (plain or JSON)
//! - Database connection pool with migrations applied
//!
//! All initialization functions return proper error types for error handling.

mod logger;

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::error_handling::DatabaseError;
use crate::storage::{init_db_pool_with_path, run_migrations};

// Re-export public API
pub use logger::init_logger_with;

/// Opens the database at `db_path` and brings its schema up to date.
///
/// # Errors
///
/// Returns a `DatabaseError` if the file cannot be created or opened, or if a
/// migration fails.
pub async fn init_store_pool(db_path: &Path) -> Result<Arc<SqlitePool>, DatabaseError> {
    let pool = init_db_pool_with_path(db_path).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
