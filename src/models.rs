//! Reading model shared by the publisher, the consumer, and the store.

use serde::Deserialize;

/// A single numeric reading.
///
/// The message body carries only the value; `observed_at_ms` is stamped when
/// the reading is created or received so the stored row records its arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// The measured value
    pub value: f64,
    /// Unix timestamp in milliseconds
    pub observed_at_ms: i64,
}

/// Accepted message bodies: a bare JSON number, or an object carrying the
/// number under `value` (or `speed`, as older producers send it).
#[derive(Deserialize)]
#[serde(untagged)]
enum ReadingBody {
    Bare(f64),
    Tagged {
        #[serde(alias = "speed")]
        value: f64,
    },
}

impl Reading {
    /// Creates a reading stamped with the current time.
    pub fn new(value: f64) -> Self {
        Reading {
            value,
            observed_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Parses a message body, stamping the reading with the current time.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let value = match serde_json::from_slice::<ReadingBody>(payload)? {
            ReadingBody::Bare(value) | ReadingBody::Tagged { value } => value,
        };
        Ok(Reading::new(value))
    }

    /// Encodes the reading as a message body (a bare JSON number).
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.value)
    }
}
