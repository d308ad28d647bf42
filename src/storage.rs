//! ==============================================================================
//! storage.rs - storage port for sensor readings
//! ==============================================================================
//!
//! purpose:
//!     the narrow contract the http layer uses to persist and query readings.
//!     the analysis code (downsample, stats, detection) never sees it.
//!
//! implementations:
//!     - MemoryStore: in-process store, used for local runs and tests
//!     - DatastoreStore (datastore.rs): remote document store over http
//!
//! every backend attaches the expiry horizon at write time. readings come
//! back from `query` in chronological order.
//!
//! ==============================================================================

use crate::domain::{Reading, StoredReading};
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use thiserror::Error;
use tokio::sync::RwLock;

/// readings are kept this long after they were taken
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to build storage client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode storage response: {0}")]
    Decode(String),
}

pub trait SensorStore: Send + Sync + 'static {
    /// persist every reading. on `Err` some readings may already be written.
    fn store(&self, readings: &[Reading]) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// readings with `start <= date <= end`, oldest first.
    /// an empty or inverted range is `Ok(vec![])`.
    fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Reading>, StorageError>> + Send;

    /// the most recent reading, `None` when nothing is stored
    fn current_reading(&self) -> impl Future<Output = Result<Option<Reading>, StorageError>> + Send;
}

/// in-process store, kept sorted by date
pub struct MemoryStore {
    records: RwLock<Vec<StoredReading>>,
    expiry_horizon: Duration,
}

impl MemoryStore {
    pub fn new(expiry_horizon: Duration) -> Self {
        Self { records: RwLock::new(Vec::new()), expiry_horizon }
    }

    /// every record held, with its expiry
    pub async fn records(&self) -> Vec<StoredReading> {
        self.records.read().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_EXPIRY_DAYS))
    }
}

impl SensorStore for MemoryStore {
    async fn store(&self, readings: &[Reading]) -> Result<(), StorageError> {
        if readings.is_empty() {
            return Ok(());
        }

        let mut records = self.records.write().await;
        for reading in readings {
            // after any equal dates so batches keep their order
            let at = records.partition_point(|r| r.date <= reading.date);
            records.insert(at, StoredReading::from_reading(reading, self.expiry_horizon));
        }
        tracing::debug!(count = readings.len(), total = records.len(), "stored readings in memory");
        Ok(())
    }

    async fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        if start >= end {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let from = records.partition_point(|r| r.date < start);
        let to = records.partition_point(|r| r.date <= end);
        Ok(records[from..to].iter().map(StoredReading::reading).collect())
    }

    async fn current_reading(&self) -> Result<Option<Reading>, StorageError> {
        Ok(self.records.read().await.last().map(StoredReading::reading))
    }
}
