//! Record source trait and its error type.
//!
//! The RecordSource trait abstracts over where orders come from (the hosted
//! database, a CSV export, a fixed list in tests) so the pipeline can run
//! against any of them.

use thiserror::Error;

use crate::domain::{CleanedRecord, RawRecord};
use crate::postgrest::PostgrestError;

use super::clean::clean_records;

/// The backing store could not produce a table of records at all.
///
/// Per-row parse failures are not errors; those rows are dropped.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("record source unreachable: {0}")]
    Unreachable(String),

    #[error("record source rejected the request: {0}")]
    Rejected(String),

    #[error("malformed response from record source: {0}")]
    Malformed(String),

    #[error("cannot read orders file {path}: {message}")]
    File { path: String, message: String },
}

impl From<PostgrestError> for DataSourceError {
    fn from(e: PostgrestError) -> Self {
        match e {
            PostgrestError::Decode(msg) => DataSourceError::Malformed(msg),
            PostgrestError::Unauthorized(_) | PostgrestError::Status { .. } => {
                DataSourceError::Rejected(e.to_string())
            }
            other => DataSourceError::Unreachable(other.to_string()),
        }
    }
}

pub trait RecordSource: Send + Sync {
    /// Human-readable name of this source, used in logs.
    fn name(&self) -> &str;

    /// Every row of the orders table, unparsed.
    fn fetch_raw(&self) -> Result<Vec<RawRecord>, DataSourceError>;

    /// Completed orders with parsed timestamp and amount. An empty vector
    /// means no usable records, which is not an error.
    fn fetch_completed_records(&self) -> Result<Vec<CleanedRecord>, DataSourceError> {
        let raw = self.fetch_raw()?;
        let fetched = raw.len();
        let cleaned = clean_records(raw);
        tracing::info!(
            source = self.name(),
            fetched,
            completed = cleaned.len(),
            "fetched order records"
        );
        Ok(cleaned)
    }
}
