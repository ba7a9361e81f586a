//! Result formatting: period labels and non-finite sanitization.

use crate::domain::{ForecastPoint, Granularity, RawForecast};

/// `None` for NaN and infinities, which have no JSON representation.
pub fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Period label: `YYYY-MM` for monthly, `YYYY` for yearly.
pub fn period_label(forecast: &RawForecast, granularity: Granularity) -> String {
    forecast
        .timestamp
        .format(granularity.label_format())
        .to_string()
}

pub fn format(raw: &[RawForecast], granularity: Granularity) -> Vec<ForecastPoint> {
    raw.iter()
        .map(|r| ForecastPoint {
            label: period_label(r, granularity),
            predicted: finite_or_null(r.predicted),
            lower_bound: finite_or_null(r.lower_bound),
            upper_bound: finite_or_null(r.upper_bound),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(y: i32, m: u32, predicted: f64, lower: f64, upper: f64) -> RawForecast {
        RawForecast {
            timestamp: NaiveDate::from_ymd_opt(y, m, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            predicted,
            lower_bound: lower,
            upper_bound: upper,
        }
    }

    #[test]
    fn monthly_labels() {
        let out = format(&[raw(2024, 3, 1.0, 0.5, 1.5)], Granularity::Monthly);
        assert_eq!(out[0].label, "2024-03");
        assert_eq!(out[0].predicted, Some(1.0));
        assert_eq!(out[0].lower_bound, Some(0.5));
        assert_eq!(out[0].upper_bound, Some(1.5));
    }

    #[test]
    fn yearly_labels() {
        let out = format(&[raw(2026, 1, 1.0, 0.0, 2.0)], Granularity::Yearly);
        assert_eq!(out[0].label, "2026");
    }

    #[test]
    fn non_finite_values_become_null() {
        let out = format(
            &[raw(2024, 1, f64::NAN, f64::NEG_INFINITY, f64::INFINITY)],
            Granularity::Monthly,
        );
        assert_eq!(out[0].predicted, None);
        assert_eq!(out[0].lower_bound, None);
        assert_eq!(out[0].upper_bound, None);

        let json = serde_json::to_string(&out[0]).unwrap();
        assert_eq!(
            json,
            r#"{"label":"2024-01","predicted":null,"lower_bound":null,"upper_bound":null}"#
        );
    }

    #[test]
    fn preserves_order() {
        let out = format(
            &[raw(2024, 1, 1.0, 1.0, 1.0), raw(2024, 2, 2.0, 2.0, 2.0)],
            Granularity::Monthly,
        );
        let labels: Vec<&str> = out.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["2024-01", "2024-02"]);
    }
}
