//! Fixed in-process record list, for tests and offline demos.

use std::sync::Mutex;

use super::source::{DataSourceError, RecordSource};
use crate::domain::RawRecord;

/// Serves a fixed set of rows, or a fixed failure.
pub struct StaticRecordSource {
    rows: Vec<RawRecord>,
    failure: Option<String>,
    calls: Mutex<usize>,
}

impl StaticRecordSource {
    pub fn new(rows: Vec<RawRecord>) -> Self {
        Self {
            rows,
            failure: None,
            calls: Mutex::new(0),
        }
    }

    /// A source whose every fetch fails as unreachable.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            failure: Some(message.into()),
            calls: Mutex::new(0),
        }
    }

    /// How many times the source has been read.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl RecordSource for StaticRecordSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_raw(&self) -> Result<Vec<RawRecord>, DataSourceError> {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        match &self.failure {
            Some(message) => Err(DataSourceError::Unreachable(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}
