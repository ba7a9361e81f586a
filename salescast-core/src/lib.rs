//! Salescast Core: the stages of the sales forecast pipeline.
//!
//! - Domain types (raw and cleaned order records, aggregated series, forecasts)
//! - Record sources (hosted REST table, CSV file, in-memory)
//! - Period aggregation with no gap filling
//! - Forecast engine over a pluggable model
//! - Output formatting with period labels and null-safe values
//! - Forecast store with per-granularity replace semantics

pub mod aggregate;
pub mod circuit_breaker;
pub mod data;
pub mod domain;
pub mod engine;
pub mod format;
pub mod model;
pub mod postgrest;
pub mod store;

pub use aggregate::{aggregate, AggregationError};
pub use engine::{ForecastEngine, Horizons, TrainingError};
pub use format::format;
