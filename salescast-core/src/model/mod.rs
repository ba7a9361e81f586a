//! Forecasting model seam.
//!
//! The pipeline only relies on `fit(history)` followed by
//! `predict(future_timestamps)` returning point forecasts with bounds. Any
//! model honouring that contract can be plugged in through [`ModelBuilder`].

pub mod smoothing;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{AggregatedPoint, Granularity};

pub use smoothing::{ExponentialSmoothing, SmoothingBuilder};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("need at least {required} observations, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("observation {index} is not finite")]
    NonFinite { index: usize },

    #[error("history timestamps must be strictly increasing (violated at {index})")]
    UnorderedHistory { index: usize },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("{timestamp} is not after the end of the training history")]
    NotFuture { timestamp: NaiveDateTime },

    #[error("{0}")]
    Other(String),
}

/// One predicted value with its uncertainty interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

pub trait ForecastModel: Send {
    /// Model name, used in logs.
    fn name(&self) -> &str;

    /// Train on the full history. Replaces any previous fit.
    fn fit(&mut self, history: &[AggregatedPoint]) -> Result<(), ModelError>;

    /// One prediction per requested timestamp, in the same order.
    fn predict(&self, future: &[NaiveDateTime]) -> Result<Vec<Prediction>, ModelError>;
}

/// Creates a fresh, unfitted model for a granularity.
pub trait ModelBuilder: Send + Sync {
    fn build(&self, granularity: Granularity) -> Box<dyn ForecastModel>;
}

impl<F> ModelBuilder for F
where
    F: Fn(Granularity) -> Box<dyn ForecastModel> + Send + Sync,
{
    fn build(&self, granularity: Granularity) -> Box<dyn ForecastModel> {
        self(granularity)
    }
}
