// storage/mod.rs
// Reading persistence

/// Schema migrations
pub mod migrations;
/// Row types
pub mod models;
/// Connection pool setup
pub mod pool;
/// Read queries
pub mod query;
/// Batch writes
pub mod store;
#[cfg(test)]
pub mod test_helpers;

// Re-export commonly used items
pub use migrations::run_migrations;
pub use models::ReadingRow;
pub use pool::init_db_pool_with_path;
pub use query::{count_readings, fetch_recent_readings};
pub use store::{ReadingStore, SqliteReadingStore};
