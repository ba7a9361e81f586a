//! Forecast engine: fit a fresh model on a series and project future periods.

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{Granularity, RawForecast, Series};
use crate::model::{ModelBuilder, ModelError, SmoothingBuilder};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("{model} failed to fit {granularity} series: {source}")]
    Fit {
        model: String,
        granularity: Granularity,
        #[source]
        source: ModelError,
    },

    #[error("{model} failed to predict {granularity} periods: {source}")]
    Predict {
        model: String,
        granularity: Granularity,
        #[source]
        source: ModelError,
    },

    #[error("{model} returned {actual} predictions for {expected} {granularity} periods")]
    PredictionCount {
        model: String,
        granularity: Granularity,
        expected: usize,
        actual: usize,
    },
}

/// Number of future periods per granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizons {
    pub monthly: usize,
    pub yearly: usize,
}

impl Horizons {
    pub fn for_granularity(&self, granularity: Granularity) -> usize {
        match granularity {
            Granularity::Monthly => self.monthly,
            Granularity::Yearly => self.yearly,
        }
    }
}

impl Default for Horizons {
    fn default() -> Self {
        Self {
            monthly: Granularity::Monthly.default_horizon(),
            yearly: Granularity::Yearly.default_horizon(),
        }
    }
}

/// Period boundaries strictly after `last`, one frequency-step apart.
///
/// Stops early if chrono cannot represent a later boundary.
pub fn future_periods(
    last: NaiveDateTime,
    granularity: Granularity,
    horizon: usize,
) -> Vec<NaiveDateTime> {
    let mut periods = Vec::with_capacity(horizon);
    let mut current = last;
    for _ in 0..horizon {
        match granularity.next_period(current) {
            Some(next) => {
                periods.push(next);
                current = next;
            }
            None => break,
        }
    }
    periods
}

#[derive(Clone)]
pub struct ForecastEngine {
    builder: Arc<dyn ModelBuilder>,
    horizons: Horizons,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(Arc::new(SmoothingBuilder), Horizons::default())
    }
}

impl ForecastEngine {
    pub fn new(builder: Arc<dyn ModelBuilder>, horizons: Horizons) -> Self {
        Self { builder, horizons }
    }

    /// Train on the whole series and forecast the configured horizon.
    ///
    /// An empty result (zero future periods) is not an error.
    pub fn fit_and_forecast(&self, series: &Series) -> Result<Vec<RawForecast>, TrainingError> {
        let granularity = series.granularity();
        let future = future_periods(
            series.last_period(),
            granularity,
            self.horizons.for_granularity(granularity),
        );
        if future.is_empty() {
            warn!(%granularity, "no future periods to forecast");
            return Ok(Vec::new());
        }

        let mut model = self.builder.build(granularity);
        let model_name = model.name().to_string();
        model
            .fit(series.points())
            .map_err(|source| TrainingError::Fit {
                model: model_name.clone(),
                granularity,
                source,
            })?;
        info!(%granularity, model = %model_name, points = series.len(), "model trained");

        let predictions = model
            .predict(&future)
            .map_err(|source| TrainingError::Predict {
                model: model_name.clone(),
                granularity,
                source,
            })?;
        if predictions.len() != future.len() {
            return Err(TrainingError::PredictionCount {
                model: model_name,
                granularity,
                expected: future.len(),
                actual: predictions.len(),
            });
        }

        info!(%granularity, periods = future.len(), "prediction complete");
        Ok(future
            .into_iter()
            .zip(predictions)
            .map(|(timestamp, p)| RawForecast {
                timestamp,
                predicted: p.predicted,
                lower_bound: p.lower,
                upper_bound: p.upper,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AggregatedPoint;
    use crate::model::{ForecastModel, Prediction};
    use chrono::NaiveDate;

    fn month(y: i32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(granularity: Granularity, starts: &[NaiveDateTime]) -> Series {
        let points = starts
            .iter()
            .enumerate()
            .map(|(i, &period_start)| AggregatedPoint {
                period_start,
                total_amount: 100.0 + i as f64,
            })
            .collect();
        Series::new(granularity, points).unwrap()
    }

    struct Broken;

    impl ForecastModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn fit(&mut self, _: &[AggregatedPoint]) -> Result<(), ModelError> {
            Err(ModelError::Other("degenerate series".into()))
        }
        fn predict(&self, _: &[NaiveDateTime]) -> Result<Vec<Prediction>, ModelError> {
            Ok(Vec::new())
        }
    }

    struct ShortChanged;

    impl ForecastModel for ShortChanged {
        fn name(&self) -> &str {
            "short"
        }
        fn fit(&mut self, _: &[AggregatedPoint]) -> Result<(), ModelError> {
            Ok(())
        }
        fn predict(&self, _: &[NaiveDateTime]) -> Result<Vec<Prediction>, ModelError> {
            Ok(vec![Prediction { predicted: 1.0, lower: 0.0, upper: 2.0 }])
        }
    }

    #[test]
    fn future_starts_one_step_after_last_month() {
        let periods = future_periods(month(2024, 11), Granularity::Monthly, 12);
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[0], month(2024, 12));
        assert_eq!(periods[1], month(2025, 1));
        assert_eq!(periods[11], month(2025, 11));
    }

    #[test]
    fn yearly_future_uses_year_steps() {
        let periods = future_periods(month(2023, 1), Granularity::Yearly, 3);
        assert_eq!(periods, vec![month(2024, 1), month(2025, 1), month(2026, 1)]);
    }

    #[test]
    fn monthly_forecast_has_twelve_periods() {
        let s = series(
            Granularity::Monthly,
            &[month(2024, 1), month(2024, 2), month(2024, 3)],
        );
        let out = ForecastEngine::default().fit_and_forecast(&s).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(out[0].timestamp, month(2024, 4));
        assert!(out.iter().all(|r| r.timestamp > s.last_period()));
    }

    #[test]
    fn yearly_forecast_has_three_periods() {
        let s = series(Granularity::Yearly, &[month(2021, 1), month(2022, 1), month(2023, 1)]);
        let out = ForecastEngine::default().fit_and_forecast(&s).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].timestamp, month(2024, 1));
    }

    #[test]
    fn zero_horizon_is_empty_not_error() {
        let engine = ForecastEngine::new(
            Arc::new(SmoothingBuilder),
            Horizons { monthly: 0, yearly: 3 },
        );
        let s = series(Granularity::Monthly, &[month(2024, 1), month(2024, 2)]);
        assert!(engine.fit_and_forecast(&s).unwrap().is_empty());
    }

    #[test]
    fn fit_failure_is_training_error() {
        let builder = |_: Granularity| -> Box<dyn ForecastModel> { Box::new(Broken) };
        let engine = ForecastEngine::new(Arc::new(builder), Horizons::default());
        let s = series(Granularity::Monthly, &[month(2024, 1), month(2024, 2)]);
        let err = engine.fit_and_forecast(&s).unwrap_err();
        assert!(matches!(err, TrainingError::Fit { .. }));
        assert!(err.to_string().contains("degenerate series"));
    }

    #[test]
    fn short_prediction_is_training_error() {
        let builder = |_: Granularity| -> Box<dyn ForecastModel> { Box::new(ShortChanged) };
        let engine = ForecastEngine::new(Arc::new(builder), Horizons::default());
        let s = series(Granularity::Yearly, &[month(2022, 1), month(2023, 1)]);
        assert!(matches!(
            engine.fit_and_forecast(&s),
            Err(TrainingError::PredictionCount { expected: 3, actual: 1, .. })
        ));
    }
}
