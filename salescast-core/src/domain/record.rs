//! Transactional records: raw rows from the orders table and their cleaned form.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status value that marks an order as a completed sale.
pub const COMPLETED_STATUS: &str = "completed";

/// Amount cell as delivered by the backing store: numeric columns usually
/// arrive as JSON numbers, but text columns and CSV files deliver strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// One orders row before any parsing. Every field is optional because a row
/// with a missing cell is dropped during cleaning, never rejected wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub created_at: Option<String>,
    pub total_amount: Option<RawAmount>,
    pub status: Option<String>,
}

impl RawRecord {
    /// Build a raw record from a JSON object, ignoring cells of unexpected type.
    pub fn from_json_row(row: &serde_json::Map<String, serde_json::Value>) -> Self {
        use serde_json::Value;

        let text = |key: &str| match row.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        let total_amount = match row.get("total_amount") {
            Some(Value::Number(n)) => n.as_f64().map(RawAmount::Number),
            Some(Value::String(s)) => Some(RawAmount::Text(s.clone())),
            _ => None,
        };

        Self {
            created_at: text("created_at"),
            total_amount,
            status: text("status"),
        }
    }
}

/// A completed order with a parsed, timezone-naive timestamp and a finite amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub created_at: NaiveDateTime,
    pub total_amount: f64,
}
