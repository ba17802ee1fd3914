//! Fitted-curve sampling for plotting collaborators.
//!
//! Turns stored cosinor parameters back into curve points. Rendering is left
//! to the caller.

use serde::{Deserialize, Serialize};

use crate::types::{CosinorFit, CosinorRecord};

/// How consecutive days share the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveLayout {
    /// Every day on a shared axis spanning one period.
    #[default]
    Overlay,
    /// Day k offset by k periods.
    Concatenate,
}

/// One sampled curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSeries {
    /// Legend label, `"<date> (#<record_num>)"`.
    pub label: String,
    /// Axis positions in hours.
    pub hours: Vec<f64>,
    /// Model values.
    pub values: Vec<f64>,
}

/// `points` evenly spaced values from 0 to `period_hours` inclusive.
pub fn day_axis(points: usize, period_hours: f64) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = period_hours / (points - 1) as f64;
            (0..points).map(|i| i as f64 * step).collect()
        }
    }
}

/// Evaluate a fit at each time (hours). An undefined fit gives `NaN` values.
pub fn compute_curve(fit: &CosinorFit, times: &[f64], period_hours: f64) -> Vec<f64> {
    times.iter().map(|&t| fit.evaluate(t, period_hours)).collect()
}

/// Sample `periods` consecutive records starting at `start`.
///
/// Records are ordered by `(record_date, record_num)` first. Returns fewer
/// curves when the records run out. `period_hours` must match the period the
/// records were fitted with.
pub fn consecutive_curves(
    records: &[CosinorRecord],
    start: usize,
    periods: usize,
    points: usize,
    period_hours: f64,
    layout: CurveLayout,
) -> Vec<CurveSeries> {
    let mut ordered: Vec<&CosinorRecord> = records.iter().collect();
    ordered.sort_by_key(|r| (r.record_date, r.record_num));

    let axis = day_axis(points, period_hours);
    ordered
        .into_iter()
        .skip(start)
        .take(periods)
        .enumerate()
        .map(|(k, record)| {
            let offset = match layout {
                CurveLayout::Overlay => 0.0,
                CurveLayout::Concatenate => period_hours * k as f64,
            };
            CurveSeries {
                label: format!("{} (#{})", record.record_date, record.record_num),
                hours: axis.iter().map(|t| t + offset).collect(),
                values: compute_curve(&record.fit, &axis, period_hours),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FitStatus;
    use chrono::NaiveDate;

    fn record(day: u32, num: usize, mesor: f64) -> CosinorRecord {
        CosinorRecord {
            group: "S".to_string(),
            animal_id: "S01".to_string(),
            record_date: NaiveDate::from_ymd_opt(2023, 5, day).unwrap(),
            record_num: num,
            fit: CosinorFit {
                mesor,
                amplitude: 0.5,
                acrophase: 0.0,
                r_squared: 0.9,
                iterations: 5,
                status: FitStatus::Converged,
            },
            percentiles: Vec::new(),
        }
    }

    #[test]
    fn test_day_axis() {
        let axis = day_axis(240, 24.0);
        assert_eq!(axis.len(), 240);
        assert_eq!(axis[0], 0.0);
        assert!((axis[239] - 24.0).abs() < 1e-12);
        assert!(day_axis(0, 24.0).is_empty());
        assert_eq!(day_axis(1, 24.0), vec![0.0]);
        assert_eq!(day_axis(3, 12.0), vec![0.0, 6.0, 12.0]);
    }

    #[test]
    fn test_compute_curve() {
        let fit = record(1, 288, 39.0).fit;
        let values = compute_curve(&fit, &[0.0, 6.0, 12.0], 24.0);
        assert!((values[0] - 39.5).abs() < 1e-12);
        assert!((values[1] - 39.0).abs() < 1e-12);
        assert!((values[2] - 38.5).abs() < 1e-12);

        let undefined = CosinorFit::undefined(FitStatus::NotConverged);
        assert!(compute_curve(&undefined, &[1.0], 24.0)[0].is_nan());
    }

    #[test]
    fn test_consecutive_curves_order_and_window() {
        let records = vec![record(3, 288, 39.3), record(1, 288, 39.1), record(2, 287, 39.2)];
        let curves = consecutive_curves(&records, 1, 5, 25, 24.0, CurveLayout::Overlay);

        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].label, "2023-05-02 (#287)");
        assert_eq!(curves[1].label, "2023-05-03 (#288)");
        assert_eq!(curves[1].hours[0], 0.0);
        assert!((curves[0].values[0] - 39.7).abs() < 1e-12);
    }

    #[test]
    fn test_concatenate_offsets_days() {
        let records = vec![record(1, 288, 39.0), record(2, 288, 39.0)];
        let curves = consecutive_curves(&records, 0, 2, 3, 24.0, CurveLayout::Concatenate);

        assert_eq!(curves[0].hours, vec![0.0, 12.0, 24.0]);
        assert_eq!(curves[1].hours, vec![24.0, 36.0, 48.0]);
    }

    #[test]
    fn test_curves_follow_fitted_period() {
        // A 12 h rhythm: one full cycle per curve, offsets step by 12 h.
        let records = vec![record(1, 288, 39.0), record(2, 288, 39.0)];
        let curves = consecutive_curves(&records, 0, 2, 3, 12.0, CurveLayout::Concatenate);

        assert_eq!(curves[0].hours, vec![0.0, 6.0, 12.0]);
        assert_eq!(curves[1].hours, vec![12.0, 18.0, 24.0]);
        let values = &curves[1].values;
        assert!((values[0] - 39.5).abs() < 1e-12);
        assert!((values[1] - 38.5).abs() < 1e-12);
        assert!((values[2] - 39.5).abs() < 1e-12);
    }
}
