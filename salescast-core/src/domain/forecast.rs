//! Forecast output types: raw model rows, formatted points, and the stored record.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::Granularity;

/// One future period as produced by the forecast engine, before formatting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawForecast {
    pub timestamp: NaiveDateTime,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Externally visible forecast row. Non-finite model output is `None`,
/// which serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub label: String,
    pub predicted: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

/// The current forecast for one granularity. Replaced wholesale on every
/// successful run, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub granularity: Granularity,
    pub forecast_data: Vec<ForecastPoint>,
    /// Written as RFC 3339 UTC. Read with or without an offset, so both
    /// `timestamptz` and `timestamp` columns load; a missing offset means UTC.
    #[serde(deserialize_with = "deserialize_generated_at")]
    pub generated_at: DateTime<Utc>,
}

fn deserialize_generated_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    crate::data::parse_timestamp(&raw)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| de::Error::custom(format!("invalid generated_at timestamp {raw:?}")))
}
