//! Aggregated time series fed to the forecasting model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Granularity;

/// Sum of completed-order amounts within one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    /// Period-start boundary, timezone-naive.
    pub period_start: NaiveDateTime,
    pub total_amount: f64,
}

/// Chronologically ordered, populated periods at one granularity.
///
/// Invariant: at least two points, strictly increasing `period_start`.
/// Only [`Series::new`] constructs one, so holding a `Series` is proof the
/// history is usable for training.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    granularity: Granularity,
    points: Vec<AggregatedPoint>,
}

impl Series {
    /// Minimum number of points a model can be trained on.
    pub const MIN_POINTS: usize = 2;

    /// Wrap ordered points. Returns `None` when there are fewer than
    /// [`Series::MIN_POINTS`] or the boundaries are not strictly increasing.
    pub fn new(granularity: Granularity, points: Vec<AggregatedPoint>) -> Option<Self> {
        if points.len() < Self::MIN_POINTS {
            return None;
        }
        if points
            .windows(2)
            .any(|w| w[0].period_start >= w[1].period_start)
        {
            return None;
        }
        Some(Self {
            granularity,
            points,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn points(&self) -> &[AggregatedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last historical period boundary.
    pub fn last_period(&self) -> NaiveDateTime {
        // Non-empty by construction.
        self.points[self.points.len() - 1].period_start
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total_amount).collect()
    }
}
