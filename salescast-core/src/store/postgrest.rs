//! `forecast_results` table behind the hosted database's REST API.
//!
//! Reads go through the reader client (anon key); deletes and inserts
//! through the writer client (service key, or anon when none is set).

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::{ForecastStore, StorageError};
use crate::domain::{ForecastRecord, Granularity};
use crate::postgrest::{PostgrestClient, PostgrestError, TableRequest};

const SELECT_COLUMNS: &str = "granularity,forecast_data,generated_at";

pub struct PostgrestForecastStore {
    reader: Arc<PostgrestClient>,
    writer: Arc<PostgrestClient>,
    table: String,
}

impl PostgrestForecastStore {
    pub fn new(
        reader: Arc<PostgrestClient>,
        writer: Arc<PostgrestClient>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            writer,
            table: table.into(),
        }
    }
}

fn storage_error(operation: &'static str, err: PostgrestError) -> StorageError {
    let message = err.to_string();
    if err.is_transient() {
        StorageError::Unreachable { operation, message }
    } else {
        StorageError::Rejected { operation, message }
    }
}

fn granularity_filter(granularity: Granularity) -> String {
    format!("eq.{granularity}")
}

/// First row of a PostgREST array response, if any.
fn first_row(body: Value) -> Result<Option<ForecastRecord>, StorageError> {
    let row = match body {
        Value::Null => return Ok(None),
        Value::Array(rows) => match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        },
        other => {
            return Err(StorageError::Malformed(format!(
                "expected a JSON array, got {other}"
            )))
        }
    };
    serde_json::from_value(row)
        .map(Some)
        .map_err(|e| StorageError::Malformed(e.to_string()))
}

impl ForecastStore for PostgrestForecastStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    fn delete(&self, granularity: Granularity) -> Result<(), StorageError> {
        let request = TableRequest::new(Method::DELETE, &self.table)
            .param("granularity", granularity_filter(granularity));
        self.writer
            .execute(&request)
            .map(|_| ())
            .map_err(|e| storage_error("delete", e))
    }

    fn insert(&self, record: &ForecastRecord) -> Result<ForecastRecord, StorageError> {
        let body = serde_json::to_value(record).map_err(|e| StorageError::Malformed(e.to_string()))?;
        let request = TableRequest::new(Method::POST, &self.table)
            .body(body)
            .prefer("return=representation");
        let response = self
            .writer
            .execute(&request)
            .map_err(|e| storage_error("insert", e))?;

        first_row(response)?.ok_or(StorageError::Unconfirmed {
            granularity: record.granularity,
        })
    }

    fn get_latest(&self, granularity: Granularity) -> Result<Option<ForecastRecord>, StorageError> {
        let request = TableRequest::new(Method::GET, &self.table)
            .param("select", SELECT_COLUMNS)
            .param("granularity", granularity_filter(granularity))
            .param("order", "generated_at.desc")
            .param("limit", "1");
        let body = self
            .reader
            .execute(&request)
            .map_err(|e| storage_error("read", e))?;
        first_row(body)
    }
}
