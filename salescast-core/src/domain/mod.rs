//! Domain types for the forecast pipeline

pub mod forecast;
pub mod granularity;
pub mod record;
pub mod series;

pub use forecast::{ForecastPoint, ForecastRecord, RawForecast};
pub use granularity::{Granularity, ParseGranularityError};
pub use record::{CleanedRecord, RawAmount, RawRecord, COMPLETED_STATUS};
pub use series::{AggregatedPoint, Series};
