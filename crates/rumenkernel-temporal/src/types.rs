//! Temperature series types and analysis result records.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

// ============================================================================
// Series Types
// ============================================================================

/// A single logger reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    /// Reading time.
    pub timestamp: NaiveDateTime,
    /// Temperature in °C. `NaN` marks a nulled reading.
    pub value: f64,
}

impl TemperatureSample {
    /// Create a new sample.
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Whether the reading holds a usable value.
    pub fn is_defined(&self) -> bool {
        self.value.is_finite()
    }

    /// Time of day in fractional hours (h + m/60 + s/3600).
    pub fn hour_of_day(&self) -> f64 {
        let t = self.timestamp.time();
        t.hour() as f64 + t.minute() as f64 / 60.0 + t.second() as f64 / 3600.0
    }
}

/// The full reading history of one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalSeries {
    /// Logger / animal identifier.
    pub animal_id: String,
    /// Samples with strictly increasing timestamps.
    pub samples: Vec<TemperatureSample>,
}

impl AnimalSeries {
    /// Create a series, sorting by timestamp and dropping repeated timestamps
    /// (the first reading wins).
    pub fn new(animal_id: impl Into<String>, mut samples: Vec<TemperatureSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        samples.dedup_by_key(|s| s.timestamp);
        Self {
            animal_id: animal_id.into(),
            samples,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Group prefix of the animal id (its first character).
    pub fn group(&self) -> String {
        animal_group(&self.animal_id)
    }

    /// Split into calendar days in date order.
    pub fn split_days(&self) -> Vec<(NaiveDate, &[TemperatureSample])> {
        let mut days = Vec::new();
        let mut start = 0;
        for i in 1..=self.samples.len() {
            let boundary = i == self.samples.len()
                || self.samples[i].timestamp.date() != self.samples[start].timestamp.date();
            if boundary {
                days.push((self.samples[start].timestamp.date(), &self.samples[start..i]));
                start = i;
            }
        }
        days
    }
}

/// Group prefix of an animal id (its first character).
pub fn animal_group(animal_id: &str) -> String {
    animal_id.chars().next().map(String::from).unwrap_or_default()
}

/// One animal-day restricted to readings at or above an inclusion floor.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    /// Calendar day.
    pub date: NaiveDate,
    /// Samples at or above the floor, in time order.
    pub samples: Vec<TemperatureSample>,
}

impl SeriesWindow {
    /// Keep the samples whose value is at or above `floor`.
    pub fn at_or_above(date: NaiveDate, samples: &[TemperatureSample], floor: f64) -> Self {
        Self {
            date,
            samples: samples.iter().copied().filter(|s| s.value >= floor).collect(),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the window meets the minimum sample count.
    pub fn is_eligible(&self, min_samples: usize) -> bool {
        self.samples.len() >= min_samples
    }
}

// ============================================================================
// Cosinor Types
// ============================================================================

/// Outcome of a cosinor fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    /// Optimizer converged.
    Converged,
    /// Iteration cap reached or no further progress possible.
    NotConverged,
    /// Fewer than three usable points.
    InsufficientData,
    /// Values have no variance.
    Degenerate,
}

impl FitStatus {
    /// Short description used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::NotConverged => "did not converge",
            Self::InsufficientData => "insufficient data",
            Self::Degenerate => "constant series",
        }
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted cosinor parameters: `value(t) = mesor + amplitude·cos(2π·t/period + acrophase)`.
///
/// Every numeric field is `NaN` unless `status` is `Converged`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CosinorFit {
    /// Mesor (M).
    pub mesor: f64,
    /// Amplitude (A), never negative.
    pub amplitude: f64,
    /// Acrophase (φ) in radians, within (−π, π].
    pub acrophase: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Optimizer iterations used.
    pub iterations: usize,
    /// Fit outcome.
    pub status: FitStatus,
}

impl CosinorFit {
    /// An undefined fit carrying only its status.
    pub fn undefined(status: FitStatus) -> Self {
        Self {
            mesor: f64::NAN,
            amplitude: f64::NAN,
            acrophase: f64::NAN,
            r_squared: f64::NAN,
            iterations: 0,
            status,
        }
    }

    /// Whether the parameters are usable.
    pub fn is_defined(&self) -> bool {
        self.status == FitStatus::Converged
    }

    /// Evaluate the model at `hours` for the given period.
    pub fn evaluate(&self, hours: f64, period_hours: f64) -> f64 {
        self.mesor
            + self.amplitude * (2.0 * std::f64::consts::PI * hours / period_hours + self.acrophase).cos()
    }
}

/// Low/high values at one percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileReading {
    /// Percentile as a fraction in (0, 1].
    pub percentile: f64,
    /// Value at the rank in ascending order.
    pub low: f64,
    /// Value at the rank in descending order.
    pub high: f64,
}

impl PercentileReading {
    /// Column label, e.g. `5` for the 5% percentile.
    pub fn label(&self) -> String {
        percentile_label(self.percentile)
    }
}

/// Render a percentile fraction as a whole-number percentage label.
pub fn percentile_label(percentile: f64) -> String {
    let pct = percentile * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}", pct.round() as i64)
    } else {
        format!("{pct}")
    }
}

/// Daily rhythm record for one animal-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosinorRecord {
    /// Group prefix of the animal id.
    pub group: String,
    /// Animal identifier.
    pub animal_id: String,
    /// Calendar day.
    pub record_date: NaiveDate,
    /// Samples in the day window.
    pub record_num: usize,
    /// Fitted parameters.
    pub fit: CosinorFit,
    /// One reading per requested percentile.
    pub percentiles: Vec<PercentileReading>,
}

// ============================================================================
// Drink Event Types
// ============================================================================

/// One detected drop-trough-recovery excursion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrinkEvent {
    /// Time of the trough.
    pub trough_timestamp: NaiveDateTime,
    /// Hour of day of the trough.
    pub hour: u32,
    /// Trough temperature.
    pub trough_temp: f64,
    /// Reading one sample before the trough.
    pub temp_5min_before_trough: f64,
    /// Reading two samples before the trough.
    pub temp_10min_before_trough: f64,
    /// Peak before the drop.
    pub pre_drink_peak_temp: f64,
    /// Peak after the trough.
    pub post_drink_recovery_temp: f64,
    /// Minutes from trough to recovery peak.
    pub recovery_minutes: u32,
    /// Minutes from pre-drink peak to trough.
    pub drop_duration_minutes: u32,
    /// Animal identifier.
    pub source_id: String,
}

impl DrinkEvent {
    /// Depth of the drop below the pre-drink peak.
    pub fn drop_depth(&self) -> f64 {
        self.pre_drink_peak_temp - self.trough_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = AnimalSeries::new(
            "S01",
            vec![
                TemperatureSample::new(at(1, 0, 10), 39.0),
                TemperatureSample::new(at(1, 0, 0), 38.0),
                TemperatureSample::new(at(1, 0, 10), 40.0),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples[0].value, 38.0);
        assert_eq!(series.samples[1].value, 39.0);
    }

    #[test]
    fn test_split_days() {
        let series = AnimalSeries::new(
            "S01",
            vec![
                TemperatureSample::new(at(1, 23, 50), 39.0),
                TemperatureSample::new(at(1, 23, 55), 39.1),
                TemperatureSample::new(at(2, 0, 0), 39.2),
                TemperatureSample::new(at(4, 12, 0), 39.3),
            ],
        );
        let days = series.split_days();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].1.len(), 2);
        assert_eq!(days[1].0, NaiveDate::from_ymd_opt(2023, 5, 2).unwrap());
        assert_eq!(days[2].1[0].value, 39.3);

        assert!(AnimalSeries::new("S02", Vec::new()).split_days().is_empty());
    }

    #[test]
    fn test_window_floor_filter() {
        let samples = vec![
            TemperatureSample::new(at(1, 0, 0), 34.9),
            TemperatureSample::new(at(1, 0, 5), 35.0),
            TemperatureSample::new(at(1, 0, 10), f64::NAN),
            TemperatureSample::new(at(1, 0, 15), 38.0),
        ];
        let window = SeriesWindow::at_or_above(at(1, 0, 0).date(), &samples, 35.0);
        assert_eq!(window.len(), 2);
        assert!(window.is_eligible(2));
        assert!(!window.is_eligible(3));
    }

    #[test]
    fn test_hour_of_day() {
        let sample = TemperatureSample::new(
            NaiveDate::from_ymd_opt(2023, 5, 1)
                .unwrap()
                .and_hms_opt(6, 30, 36)
                .unwrap(),
            39.0,
        );
        assert!((sample.hour_of_day() - 6.51).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_label() {
        assert_eq!(percentile_label(0.01), "1");
        assert_eq!(percentile_label(0.45), "45");
        assert_eq!(percentile_label(0.025), "2.5");
    }

    #[test]
    fn test_undefined_fit() {
        let fit = CosinorFit::undefined(FitStatus::Degenerate);
        assert!(!fit.is_defined());
        assert!(fit.r_squared.is_nan());
        assert_eq!(fit.status.to_string(), "constant series");
        assert_eq!(animal_group("S0012"), "S");
        assert_eq!(animal_group(""), "");
    }
}
