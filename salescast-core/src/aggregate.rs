//! Series aggregation: bucket cleaned records into period-start boundaries.
//!
//! Only periods with at least one record appear in the output. Empty periods
//! are not zero-filled: the model treats the sequence as the full training
//! history.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{AggregatedPoint, CleanedRecord, Granularity, Series};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("cannot compute {granularity} period boundary for {timestamp}")]
    Boundary {
        granularity: Granularity,
        timestamp: NaiveDateTime,
    },
}

/// Sum record amounts per period.
///
/// Returns `Ok(None)` when the input is empty or fewer than
/// [`Series::MIN_POINTS`] periods are populated.
pub fn aggregate(
    records: &[CleanedRecord],
    granularity: Granularity,
) -> Result<Option<Series>, AggregationError> {
    if records.is_empty() {
        warn!(%granularity, "no records to aggregate");
        return Ok(None);
    }

    let mut buckets: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for record in records {
        let period_start = granularity.period_start(record.created_at).ok_or(
            AggregationError::Boundary {
                granularity,
                timestamp: record.created_at,
            },
        )?;
        *buckets.entry(period_start).or_insert(0.0) += record.total_amount;
    }

    let points: Vec<AggregatedPoint> = buckets
        .into_iter()
        .map(|(period_start, total_amount)| AggregatedPoint {
            period_start,
            total_amount,
        })
        .collect();
    let count = points.len();

    match Series::new(granularity, points) {
        Some(series) => {
            info!(%granularity, points = count, "aggregated series");
            Ok(Some(series))
        }
        None => {
            warn!(%granularity, points = count, "insufficient periods after aggregation");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(y: i32, m: u32, d: u32, amount: f64) -> CleanedRecord {
        CleanedRecord {
            created_at: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(15, 45, 0)
                .unwrap(),
            total_amount: amount,
        }
    }

    fn month(y: i32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn three_months_sum_per_bucket() {
        let records = vec![
            rec(2024, 3, 30, 5.0),
            rec(2024, 1, 2, 10.0),
            rec(2024, 1, 31, 15.0),
            rec(2024, 2, 14, 7.0),
            rec(2024, 3, 1, 1.0),
        ];
        let series = aggregate(&records, Granularity::Monthly).unwrap().unwrap();
        let points = series.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].period_start, month(2024, 1));
        assert_eq!(points[0].total_amount, 25.0);
        assert_eq!(points[1].period_start, month(2024, 2));
        assert_eq!(points[1].total_amount, 7.0);
        assert_eq!(points[2].period_start, month(2024, 3));
        assert_eq!(points[2].total_amount, 6.0);
    }

    #[test]
    fn gaps_are_not_filled() {
        let records = vec![rec(2024, 1, 5, 1.0), rec(2024, 4, 5, 2.0)];
        let series = aggregate(&records, Granularity::Monthly).unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[1].period_start, month(2024, 4));
    }

    #[test]
    fn single_period_is_insufficient() {
        let records = vec![rec(2024, 1, 5, 1.0), rec(2024, 1, 20, 2.0)];
        assert!(aggregate(&records, Granularity::Monthly).unwrap().is_none());
    }

    #[test]
    fn empty_input_is_insufficient() {
        assert!(aggregate(&[], Granularity::Yearly).unwrap().is_none());
    }

    #[test]
    fn yearly_buckets_at_year_start() {
        let records = vec![
            rec(2022, 6, 1, 100.0),
            rec(2023, 2, 1, 50.0),
            rec(2023, 11, 1, 25.0),
        ];
        let series = aggregate(&records, Granularity::Yearly).unwrap().unwrap();
        assert_eq!(series.values(), vec![100.0, 75.0]);
        assert_eq!(series.last_period(), month(2023, 1));
    }
}
