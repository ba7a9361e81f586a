//! Orders exported to CSV, the fallback when the hosted database is not used.
//!
//! Expected header: `created_at,total_amount,status` (extra columns ignored).

use std::path::PathBuf;

use serde::Deserialize;

use super::source::{DataSourceError, RecordSource};
use crate::domain::{RawAmount, RawRecord};

#[derive(Debug, Deserialize)]
struct CsvRow {
    created_at: Option<String>,
    total_amount: Option<String>,
    status: Option<String>,
}

pub struct CsvRecordSource {
    path: PathBuf,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn file_error(&self, message: impl ToString) -> DataSourceError {
        DataSourceError::File {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl RecordSource for CsvRecordSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_raw(&self) -> Result<Vec<RawRecord>, DataSourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.file_error(e))?;

        let headers = reader.headers().map_err(|e| self.file_error(e))?;
        for required in ["created_at", "total_amount", "status"] {
            if !headers.iter().any(|h| h == required) {
                return Err(self.file_error(format!("missing column '{required}'")));
            }
        }

        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            match row {
                Ok(row) => records.push(RawRecord {
                    created_at: row.created_at.filter(|s| !s.is_empty()),
                    total_amount: row
                        .total_amount
                        .filter(|s| !s.is_empty())
                        .map(RawAmount::Text),
                    status: row.status,
                }),
                // A row the reader cannot split is a per-row failure.
                Err(e) => tracing::debug!(path = %self.path.display(), error = %e, "skipping CSV row"),
            }
        }
        Ok(records)
    }
}
