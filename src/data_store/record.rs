use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The identity key type for records in a collection.
pub type RecordKey = String;

/// Milliseconds since the UNIX epoch, the timestamp unit used by records.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A uniquely identified persisted object.
///
/// The payload is a single-row Arrow `RecordBatch`; the identity key is
/// assigned at construction and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    key: RecordKey,
    payload: Arc<RecordBatch>,
    created: u64,
    updated: u64,
}

impl EntityRecord {
    /// Creates a new record stamped with the current time for both
    /// `created` and `updated`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use savemode::prelude::*;
    ///
    /// let payload = payload_from_pairs(&[("name", "v1")]).unwrap();
    /// let record = EntityRecord::new("4f1c".to_string(), payload);
    /// assert_eq!(record.created(), record.updated());
    /// ```
    pub fn new(key: RecordKey, payload: RecordBatch) -> Self {
        let now = now_millis();
        Self::with_timestamps(key, payload, now, now)
    }

    /// Creates a record with explicit timestamps.
    pub fn with_timestamps(key: RecordKey, payload: RecordBatch, created: u64, updated: u64) -> Self {
        Self {
            key,
            payload: Arc::new(payload),
            created,
            updated,
        }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn payload(&self) -> &Arc<RecordBatch> {
        &self.payload
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn updated(&self) -> u64 {
        self.updated
    }

    /// Returns a copy of this record carrying `payload` and a refreshed
    /// `updated` timestamp. Key and `created` are preserved.
    pub fn revise(&self, payload: RecordBatch) -> Self {
        // Keep `updated` monotonic even if the wall clock stalls.
        let updated = now_millis().max(self.updated);
        Self {
            key: self.key.clone(),
            payload: Arc::new(payload),
            created: self.created,
            updated,
        }
    }
}
