//! Orders table read through the hosted database's REST API.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::source::{DataSourceError, RecordSource};
use crate::domain::RawRecord;
use crate::postgrest::{PostgrestClient, TableRequest};

const SELECT_COLUMNS: &str = "created_at,total_amount,status";

pub struct PostgrestRecordSource {
    client: Arc<PostgrestClient>,
    table: String,
    page_size: usize,
}

impl PostgrestRecordSource {
    pub fn new(client: Arc<PostgrestClient>, table: impl Into<String>, page_size: usize) -> Self {
        Self {
            client,
            table: table.into(),
            page_size: page_size.max(1),
        }
    }

    fn fetch_page(&self, offset: usize) -> Result<Vec<RawRecord>, DataSourceError> {
        let request = TableRequest::new(Method::GET, &self.table)
            .param("select", SELECT_COLUMNS)
            .param("order", "created_at.asc")
            .param("limit", self.page_size.to_string())
            .param("offset", offset.to_string());
        let body = self.client.execute(&request)?;
        parse_rows(body)
    }
}

/// The body must be a JSON array of objects; anything else means the table
/// could not be read at all.
pub(crate) fn parse_rows(body: Value) -> Result<Vec<RawRecord>, DataSourceError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => {
            return Err(DataSourceError::Malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row.as_object().map(RawRecord::from_json_row).ok_or_else(|| {
                DataSourceError::Malformed(format!("row {i} is {}, not an object", json_kind(row)))
            })
        })
        .collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RecordSource for PostgrestRecordSource {
    fn name(&self) -> &str {
        "postgrest"
    }

    /// Pages until the server returns an empty page. A short page is not the
    /// end: the server may cap responses below `page_size`.
    fn fetch_raw(&self) -> Result<Vec<RawRecord>, DataSourceError> {
        let mut records = Vec::new();
        loop {
            let page = self.fetch_page(records.len())?;
            if page.is_empty() {
                break;
            }
            records.extend(page);
        }
        tracing::debug!(table = %self.table, rows = records.len(), "read orders table");
        Ok(records)
    }
}
