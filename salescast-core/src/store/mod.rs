//! Forecast store: latest forecast per granularity with replace semantics.
//!
//! Replace is delete-then-insert and NOT atomic: between the two steps a
//! reader can observe no record for the granularity.

pub mod file;
pub mod memory;
pub mod postgrest;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{ForecastPoint, ForecastRecord, Granularity};

pub use file::FileForecastStore;
pub use memory::{MemoryForecastStore, StoreFault};
pub use postgrest::PostgrestForecastStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("forecast store unreachable during {operation}: {message}")]
    Unreachable {
        operation: &'static str,
        message: String,
    },

    #[error("forecast store rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("insert for {granularity} reported success but returned no row")]
    Unconfirmed { granularity: Granularity },

    #[error("malformed stored forecast: {0}")]
    Malformed(String),

    #[error("forecast store I/O error: {0}")]
    Io(String),
}

/// What a replace call did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    /// Upstream had insufficient data; the previous record is untouched.
    Skipped,
    /// Old records deleted and nothing inserted (empty forecast).
    Cleared,
    /// Old records deleted and this record inserted.
    Stored(ForecastRecord),
}

pub trait ForecastStore: Send + Sync {
    /// Human-readable name of this backend, used in logs.
    fn name(&self) -> &str;

    /// Remove every stored record for the granularity.
    fn delete(&self, granularity: Granularity) -> Result<(), StorageError>;

    /// Insert one record, returning the row as written.
    fn insert(&self, record: &ForecastRecord) -> Result<ForecastRecord, StorageError>;

    /// Most recently generated record for the granularity.
    fn get_latest(&self, granularity: Granularity) -> Result<Option<ForecastRecord>, StorageError>;

    /// `None` points (insufficient data) skip without touching the store;
    /// an empty vector deletes and inserts nothing.
    fn replace(
        &self,
        granularity: Granularity,
        points: Option<Vec<ForecastPoint>>,
        generated_at: DateTime<Utc>,
    ) -> Result<ReplaceOutcome, StorageError> {
        let Some(points) = points else {
            warn!(%granularity, store = self.name(), "no forecast to store, keeping previous record");
            return Ok(ReplaceOutcome::Skipped);
        };

        self.delete(granularity)?;
        info!(%granularity, store = self.name(), "deleted previous forecast");

        if points.is_empty() {
            warn!(%granularity, store = self.name(), "empty forecast, store left without a record");
            return Ok(ReplaceOutcome::Cleared);
        }

        let count = points.len();
        let written = self.insert(&ForecastRecord {
            granularity,
            forecast_data: points,
            generated_at,
        })?;
        info!(%granularity, store = self.name(), points = count, "stored forecast");
        Ok(ReplaceOutcome::Stored(written))
    }
}
