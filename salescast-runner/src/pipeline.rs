//! Pipeline orchestrator.
//!
//! One run fetches records once, then drives each granularity through
//! aggregate -> train -> format -> store. Granularities run sequentially and
//! are failure-isolated: an error or panic in one is recorded as its outcome
//! and the next one still runs.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use salescast_core::data::{dataset_hash, DataSourceError, RecordSource};
use salescast_core::domain::{CleanedRecord, Granularity};
use salescast_core::store::{ForecastStore, ReplaceOutcome, StorageError};
use salescast_core::{aggregate, format, AggregationError, ForecastEngine, TrainingError};

use crate::summary::{Outcome, RunSummary};

/// Where in the per-run state machine a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Aggregating,
    Training,
    Formatting,
    Storing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching",
            Stage::Aggregating => "aggregating",
            Stage::Training => "training",
            Stage::Formatting => "formatting",
            Stage::Storing => "storing",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Source(#[from] DataSourceError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("panicked: {0}")]
    Panic(String),
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageFailure,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(StageFailure) -> PipelineError {
        move |source| PipelineError { stage, source }
    }

    /// Storage failures are reported separately from every other failure.
    pub fn outcome(&self) -> Outcome {
        match self.source {
            StageFailure::Storage(_) => Outcome::FailedStorage,
            _ => Outcome::FailedException,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Collaborators for a run, constructed once at startup.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    store: Arc<dyn ForecastStore>,
    engine: ForecastEngine,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        store: Arc<dyn ForecastStore>,
        engine: ForecastEngine,
    ) -> Self {
        Self {
            source,
            store,
            engine,
        }
    }

    /// Execute one full run. Never fails: every error ends up in the summary.
    pub fn run(&self, run_id: &str) -> RunSummary {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(run_id, source = self.source.name(), store = self.store.name(), "run started");

        let mut outcomes = BTreeMap::new();
        let mut errors = Vec::new();
        let mut record_count = 0;
        let mut hash = None;

        match self.source.fetch_completed_records() {
            Ok(records) => {
                record_count = records.len();
                hash = Some(dataset_hash(&records));
                for granularity in Granularity::ALL {
                    let outcome = match self.run_granularity_isolated(&records, granularity) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(run_id, %granularity, stage = %e.stage, error = %e, "granularity failed");
                            errors.push(format!("{granularity}: {e}"));
                            e.outcome()
                        }
                    };
                    outcomes.insert(granularity, outcome);
                }
            }
            Err(e) => {
                let e = PipelineError::at(Stage::Fetching)(e.into());
                error!(run_id, error = %e, "fetch failed, no granularity will run");
                errors.push(e.to_string());
                for granularity in Granularity::ALL {
                    outcomes.insert(granularity, Outcome::FailedException);
                }
            }
        }

        let summary = RunSummary {
            run_id: run_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            record_count,
            dataset_hash: hash,
            outcomes,
            errors,
        };
        info!(
            run_id,
            duration_ms = summary.duration_ms,
            records = summary.record_count,
            outcomes = %summary.outcome_line(),
            errors = ?summary.errors,
            "run finished"
        );
        summary
    }

    fn run_granularity_isolated(
        &self,
        records: &[CleanedRecord],
        granularity: Granularity,
    ) -> Result<Outcome, PipelineError> {
        let mut stage = Stage::Aggregating;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_granularity(records, granularity, &mut stage)
        }));
        match result {
            Ok(result) => result,
            Err(payload) => Err(PipelineError {
                stage,
                source: StageFailure::Panic(panic_message(payload.as_ref())),
            }),
        }
    }

    fn run_granularity(
        &self,
        records: &[CleanedRecord],
        granularity: Granularity,
        stage: &mut Stage,
    ) -> Result<Outcome, PipelineError> {
        *stage = Stage::Aggregating;
        info!(%granularity, stage = %stage, "stage started");
        let series = aggregate(records, granularity)
            .map_err(|e| PipelineError::at(Stage::Aggregating)(e.into()))?;

        let points = match series {
            Some(series) => {
                *stage = Stage::Training;
                info!(%granularity, stage = %stage, points = series.len(), "stage started");
                let raw = self
                    .engine
                    .fit_and_forecast(&series)
                    .map_err(|e| PipelineError::at(Stage::Training)(e.into()))?;

                *stage = Stage::Formatting;
                info!(%granularity, stage = %stage, periods = raw.len(), "stage started");
                Some(format(&raw, granularity))
            }
            None => {
                warn!(%granularity, "insufficient data, training skipped");
                None
            }
        };

        *stage = Stage::Storing;
        info!(%granularity, stage = %stage, "stage started");
        let outcome = self
            .store
            .replace(granularity, points, Utc::now())
            .map_err(|e| PipelineError::at(Stage::Storing)(e.into()))?;

        Ok(match outcome {
            ReplaceOutcome::Skipped => Outcome::Skipped,
            ReplaceOutcome::Cleared | ReplaceOutcome::Stored(_) => Outcome::Success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salescast_core::data::StaticRecordSource;
    use salescast_core::domain::{RawAmount, RawRecord};
    use salescast_core::store::{MemoryForecastStore, StoreFault};

    fn rows(months: &[(i32, u32, f64)]) -> Vec<RawRecord> {
        months
            .iter()
            .map(|&(y, m, amount)| RawRecord {
                created_at: Some(format!("{y}-{m:02}-10T12:00:00Z")),
                total_amount: Some(RawAmount::Number(amount)),
                status: Some("completed".into()),
            })
            .collect()
    }

    fn three_months_over_two_years() -> Vec<RawRecord> {
        rows(&[(2023, 11, 100.0), (2023, 12, 110.0), (2024, 1, 120.0)])
    }

    fn pipeline(source: StaticRecordSource, store: Arc<MemoryForecastStore>) -> Pipeline {
        Pipeline::new(Arc::new(source), store, ForecastEngine::default())
    }

    #[test]
    fn both_granularities_succeed() {
        let store = Arc::new(MemoryForecastStore::new());
        let summary =
            pipeline(StaticRecordSource::new(three_months_over_two_years()), store.clone()).run("r1");

        assert_eq!(summary.outcome(Granularity::Monthly), Some(Outcome::Success));
        assert_eq!(summary.outcome(Granularity::Yearly), Some(Outcome::Success));
        assert!(summary.errors.is_empty());
        assert_eq!(summary.record_count, 3);
        assert!(summary.dataset_hash.is_some());
        assert_eq!(store.records(Granularity::Monthly)[0].forecast_data.len(), 12);
        assert_eq!(store.records(Granularity::Yearly)[0].forecast_data.len(), 3);
    }

    #[test]
    fn single_year_skips_yearly() {
        let store = Arc::new(MemoryForecastStore::new());
        let source = StaticRecordSource::new(rows(&[(2024, 1, 1.0), (2024, 2, 2.0)]));
        let summary = pipeline(source, store).run("r2");
        assert_eq!(summary.outcome(Granularity::Monthly), Some(Outcome::Success));
        assert_eq!(summary.outcome(Granularity::Yearly), Some(Outcome::Skipped));
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn fetch_failure_fails_every_granularity() {
        let store = Arc::new(MemoryForecastStore::new());
        let summary = pipeline(StaticRecordSource::failing("timeout"), store).run("r3");
        for g in Granularity::ALL {
            assert_eq!(summary.outcome(g), Some(Outcome::FailedException));
        }
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("fetching failed"));
        assert!(summary.dataset_hash.is_none());
    }

    #[test]
    fn empty_fetch_skips_everything() {
        let store = Arc::new(MemoryForecastStore::new());
        let summary = pipeline(StaticRecordSource::new(Vec::new()), store).run("r4");
        for g in Granularity::ALL {
            assert_eq!(summary.outcome(g), Some(Outcome::Skipped));
        }
        assert_eq!(summary.record_count, 0);
    }

    #[test]
    fn storage_failure_is_isolated_and_labelled() {
        let store = Arc::new(
            MemoryForecastStore::new().with_fault(Granularity::Monthly, StoreFault::RejectInsert),
        );
        let summary =
            pipeline(StaticRecordSource::new(three_months_over_two_years()), store.clone()).run("r5");

        assert_eq!(summary.outcome(Granularity::Monthly), Some(Outcome::FailedStorage));
        assert_eq!(summary.outcome(Granularity::Yearly), Some(Outcome::Success));
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("monthly: storing failed"));
        assert!(store.get_latest(Granularity::Yearly).unwrap().is_some());
    }

    #[test]
    fn panicking_model_is_an_exception_outcome() {
        use salescast_core::domain::AggregatedPoint;
        use salescast_core::model::{ForecastModel, ModelError, Prediction};
        use salescast_core::Horizons;

        struct Explodes;
        impl ForecastModel for Explodes {
            fn name(&self) -> &str {
                "explodes"
            }
            fn fit(&mut self, _: &[AggregatedPoint]) -> Result<(), ModelError> {
                panic!("matrix is singular")
            }
            fn predict(
                &self,
                _: &[chrono::NaiveDateTime],
            ) -> Result<Vec<Prediction>, ModelError> {
                Ok(Vec::new())
            }
        }

        let builder = |_: Granularity| -> Box<dyn ForecastModel> { Box::new(Explodes) };
        let store = Arc::new(MemoryForecastStore::new());
        let p = Pipeline::new(
            Arc::new(StaticRecordSource::new(three_months_over_two_years())),
            store,
            ForecastEngine::new(Arc::new(builder), Horizons::default()),
        );
        let summary = p.run("r6");
        assert_eq!(summary.outcome(Granularity::Monthly), Some(Outcome::FailedException));
        assert_eq!(summary.outcome(Granularity::Yearly), Some(Outcome::FailedException));
        assert!(summary.errors[0].contains("training failed: panicked: matrix is singular"));
    }

    #[test]
    fn monthly_training_failure_still_stores_yearly() {
        use salescast_core::domain::AggregatedPoint;
        use salescast_core::model::{ExponentialSmoothing, ForecastModel, ModelError, Prediction};
        use salescast_core::Horizons;

        struct Degenerate;
        impl ForecastModel for Degenerate {
            fn name(&self) -> &str {
                "degenerate"
            }
            fn fit(&mut self, _: &[AggregatedPoint]) -> Result<(), ModelError> {
                Err(ModelError::Other("degenerate".into()))
            }
            fn predict(
                &self,
                _: &[chrono::NaiveDateTime],
            ) -> Result<Vec<Prediction>, ModelError> {
                Err(ModelError::NotFitted)
            }
        }

        let builder = |g: Granularity| -> Box<dyn ForecastModel> {
            match g {
                Granularity::Monthly => Box::new(Degenerate),
                Granularity::Yearly => Box::new(ExponentialSmoothing::new(g)),
            }
        };
        let store = Arc::new(MemoryForecastStore::new());
        let p = Pipeline::new(
            Arc::new(StaticRecordSource::new(three_months_over_two_years())),
            store.clone(),
            ForecastEngine::new(Arc::new(builder), Horizons::default()),
        );
        let summary = p.run("r7");

        assert_eq!(summary.outcome(Granularity::Monthly), Some(Outcome::FailedException));
        assert_eq!(summary.outcome(Granularity::Yearly), Some(Outcome::Success));
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("monthly: training failed"));
        assert!(store.records(Granularity::Monthly).is_empty());
        let yearly = store.records(Granularity::Yearly);
        assert_eq!(yearly.len(), 1);
        assert_eq!(yearly[0].forecast_data.len(), 3);
    }
}
