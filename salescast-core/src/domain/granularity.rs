//! Granularity: the temporal resolution a forecast is produced at.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Forecast resolution. Each variant is bound to a resampling frequency
/// (month-start / year-start) and a default horizon length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Yearly,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown granularity '{0}' (expected 'monthly' or 'yearly')")]
pub struct ParseGranularityError(pub String);

impl Granularity {
    /// Every granularity, in the order the pipeline processes them.
    pub const ALL: [Granularity; 2] = [Granularity::Monthly, Granularity::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        }
    }

    /// Number of calendar months in one period.
    pub fn step_months(&self) -> u32 {
        match self {
            Granularity::Monthly => 1,
            Granularity::Yearly => 12,
        }
    }

    /// Number of future periods forecast when nothing else is configured.
    pub fn default_horizon(&self) -> usize {
        match self {
            Granularity::Monthly => 12,
            Granularity::Yearly => 3,
        }
    }

    /// `strftime` pattern used for the externally visible period label.
    pub fn label_format(&self) -> &'static str {
        match self {
            Granularity::Monthly => "%Y-%m",
            Granularity::Yearly => "%Y",
        }
    }

    /// First instant of the period containing `ts` (month-start or year-start).
    ///
    /// Returns `None` only if chrono cannot represent the boundary.
    pub fn period_start(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = match self {
            Granularity::Monthly => NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)?,
            Granularity::Yearly => NaiveDate::from_ymd_opt(ts.year(), 1, 1)?,
        };
        date.and_hms_opt(0, 0, 0)
    }

    /// The period boundary one frequency-step after `ts`.
    pub fn next_period(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        ts.checked_add_months(Months::new(self.step_months()))
    }

    /// Whole periods from `from` to `to` (positive when `to` is later).
    pub fn periods_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        let months = |ts: NaiveDateTime| i64::from(ts.year()) * 12 + i64::from(ts.month0());
        (months(to) - months(from)) / i64::from(self.step_months())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Granularity::Monthly),
            "yearly" => Ok(Granularity::Yearly),
            other => Err(ParseGranularityError(other.to_string())),
        }
    }
}
