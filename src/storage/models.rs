// storage/models.rs
// Rows read back from the readings table

/// A persisted reading.
///
/// `observed_at_ms` is when the consumer received the reading and
/// `committed_at_ms` when the batch holding it was written; both are
/// milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRow {
    /// Row id, increasing in commit order
    pub id: i64,
    /// The reading value
    pub value: f64,
    /// When the reading was received
    pub observed_at_ms: i64,
    /// When its batch was committed
    pub committed_at_ms: i64,
}
