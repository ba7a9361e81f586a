//! Row cleaning: status filter, timestamp and amount parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::{CleanedRecord, RawAmount, RawRecord, COMPLETED_STATUS};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp into a timezone-naive instant.
///
/// Offsets are normalised to UTC before the zone is dropped; strings without
/// an offset are taken as-is; a bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // PostgreSQL renders `+00` without minutes, which RFC 3339 rejects.
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse an amount cell. Non-finite values count as unparsable.
pub fn parse_amount(raw: &RawAmount) -> Option<f64> {
    let value = match raw {
        RawAmount::Number(n) => *n,
        RawAmount::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Clean one row: `None` unless it is completed and both fields parse.
pub fn clean_record(raw: &RawRecord) -> Option<CleanedRecord> {
    if raw.status.as_deref() != Some(COMPLETED_STATUS) {
        return None;
    }
    let created_at = parse_timestamp(raw.created_at.as_deref()?)?;
    let total_amount = parse_amount(raw.total_amount.as_ref()?)?;
    Some(CleanedRecord {
        created_at,
        total_amount,
    })
}

pub fn clean_records(raw: Vec<RawRecord>) -> Vec<CleanedRecord> {
    raw.iter().filter_map(clean_record).collect()
}

/// Content hash of a cleaned record set, order-sensitive.
pub fn dataset_hash(records: &[CleanedRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for r in records {
        hasher.update(&r.created_at.and_utc().timestamp_micros().to_le_bytes());
        hasher.update(&r.total_amount.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
