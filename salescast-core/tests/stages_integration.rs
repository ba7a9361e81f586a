//! Integration tests chaining the pipeline stages by hand:
//! source -> clean -> aggregate -> engine -> format -> store.

use std::io::Write;

use chrono::{TimeZone, Utc};
use salescast_core::data::{CsvRecordSource, RecordSource, StaticRecordSource};
use salescast_core::domain::{Granularity, RawAmount, RawRecord};
use salescast_core::store::{ForecastStore, MemoryForecastStore, ReplaceOutcome};
use salescast_core::{aggregate, format, ForecastEngine};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn order(created_at: &str, amount: RawAmount, status: &str) -> RawRecord {
    RawRecord {
        created_at: Some(created_at.into()),
        total_amount: Some(amount),
        status: Some(status.into()),
    }
}

/// Two years of monthly orders with a mild upward trend, plus noise rows
/// that cleaning must discard.
fn two_years_of_orders() -> Vec<RawRecord> {
    let mut rows = Vec::new();
    for i in 0..24u32 {
        let year = 2022 + i / 12;
        let month = i % 12 + 1;
        rows.push(order(
            &format!("{year}-{month:02}-05T10:00:00+00:00"),
            RawAmount::Number(1000.0 + 25.0 * i as f64),
            "completed",
        ));
        rows.push(order(
            &format!("{year}-{month:02}-20 18:30:00"),
            RawAmount::Text("50.5".into()),
            "completed",
        ));
    }
    rows.push(order("2023-06-01T00:00:00Z", RawAmount::Number(9999.0), "cancelled"));
    rows.push(order("not a date", RawAmount::Number(1.0), "completed"));
    rows.push(order("2023-06-01T00:00:00Z", RawAmount::Text("n/a".into()), "completed"));
    rows
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn monthly_forecast_follows_last_observed_month() {
    let source = StaticRecordSource::new(two_years_of_orders());
    let records = source.fetch_completed_records().unwrap();
    assert_eq!(records.len(), 48);

    let series = aggregate(&records, Granularity::Monthly).unwrap().unwrap();
    assert_eq!(series.len(), 24);
    assert_eq!(series.values()[0], 1050.5);

    let raw = ForecastEngine::default().fit_and_forecast(&series).unwrap();
    let points = format(&raw, Granularity::Monthly);
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels.len(), 12);
    assert_eq!(labels[0], "2024-01");
    assert_eq!(labels[11], "2024-12");

    for p in &points {
        let (Some(lo), Some(mid), Some(hi)) = (p.lower_bound, p.predicted, p.upper_bound) else {
            panic!("smoothing model produced a null value for {}", p.label);
        };
        assert!(lo <= mid && mid <= hi, "{lo} <= {mid} <= {hi}");
    }
}

#[test]
fn yearly_forecast_from_two_years() {
    let source = StaticRecordSource::new(two_years_of_orders());
    let records = source.fetch_completed_records().unwrap();
    let series = aggregate(&records, Granularity::Yearly).unwrap().unwrap();
    assert_eq!(series.len(), 2);

    let raw = ForecastEngine::default().fit_and_forecast(&series).unwrap();
    let labels: Vec<String> = format(&raw, Granularity::Yearly)
        .into_iter()
        .map(|p| p.label)
        .collect();
    assert_eq!(labels, ["2024", "2025", "2026"]);
}

#[test]
fn single_year_of_data_is_insufficient_for_yearly() {
    let rows: Vec<RawRecord> = two_years_of_orders()
        .into_iter()
        .filter(|r| r.created_at.as_deref().is_some_and(|s| s.starts_with("2022")))
        .collect();
    let records = StaticRecordSource::new(rows).fetch_completed_records().unwrap();
    assert!(aggregate(&records, Granularity::Yearly).unwrap().is_none());
    assert!(aggregate(&records, Granularity::Monthly).unwrap().is_some());
}

#[test]
fn stored_record_is_what_readers_get_back() {
    let records = StaticRecordSource::new(two_years_of_orders())
        .fetch_completed_records()
        .unwrap();
    let series = aggregate(&records, Granularity::Yearly).unwrap().unwrap();
    let raw = ForecastEngine::default().fit_and_forecast(&series).unwrap();
    let points = format(&raw, Granularity::Yearly);

    let store = MemoryForecastStore::new();
    let generated_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let outcome = store
        .replace(Granularity::Yearly, Some(points.clone()), generated_at)
        .unwrap();
    assert!(matches!(outcome, ReplaceOutcome::Stored(_)));

    let latest = store.get_latest(Granularity::Yearly).unwrap().unwrap();
    assert_eq!(latest.forecast_data, points);
    assert_eq!(latest.generated_at, generated_at);
    assert!(store.get_latest(Granularity::Monthly).unwrap().is_none());
}

#[test]
fn csv_export_feeds_the_same_pipeline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,created_at,total_amount,status").unwrap();
    writeln!(file, "1,2024-01-03T09:00:00Z,100.0,completed").unwrap();
    writeln!(file, "2,2024-01-15T09:00:00Z,50,completed").unwrap();
    writeln!(file, "3,2024-02-03T09:00:00Z,120.0,completed").unwrap();
    writeln!(file, "4,2024-02-04T09:00:00Z,500.0,refunded").unwrap();
    writeln!(file, "5,2024-03-03T09:00:00Z,abc,completed").unwrap();
    writeln!(file, "6,2024-03-09T09:00:00Z,140.0,completed").unwrap();
    file.flush().unwrap();

    let source = CsvRecordSource::new(file.path());
    let records = source.fetch_completed_records().unwrap();
    assert_eq!(records.len(), 4);

    let series = aggregate(&records, Granularity::Monthly).unwrap().unwrap();
    assert_eq!(series.values(), vec![150.0, 120.0, 140.0]);
}

#[test]
fn failing_source_surfaces_an_error() {
    let source = StaticRecordSource::failing("connection refused");
    let err = source.fetch_completed_records().unwrap_err();
    assert!(err.to_string().contains("connection refused"));
}
