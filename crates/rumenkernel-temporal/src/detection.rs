//! Drink event detection kernel.
//!
//! Finds drop → trough → recovery excursions in the raw day series and
//! characterizes each one. Detection works on its own filtered copy of the
//! readings and shares nothing with the artifact corrector.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::drops::{argmax_in, argmin_in, clipped_window, event_onsets};
use crate::messages::{DrinkDetectionInput, DrinkDetectionOutput};
use crate::types::{DrinkEvent, TemperatureSample};
use rumenkernel_core::{
    config::{DetectionWindows, PipelineConfig},
    domain::Domain,
    error::{KernelError, Result},
    kernel::KernelMetadata,
    traits::{AnalysisKernel, BatchKernel},
};

// ============================================================================
// Parameters and Results
// ============================================================================

/// Drink detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Readings below this temperature are discarded before scanning.
    pub detection_floor: f64,
    /// Drop threshold for one- and two-step differences.
    pub drop_threshold: f64,
    /// Follow-up positions that suppress an onset.
    pub follow_suppression: usize,
    /// Search windows in samples.
    pub windows: DetectionWindows,
    /// Logger cadence used to turn sample offsets into minutes.
    pub sample_interval_minutes: u32,
}

impl DetectionParams {
    /// Derive parameters from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            detection_floor: config.detection.detection_floor,
            drop_threshold: config.detection.drop_threshold,
            follow_suppression: config.detection.follow_suppression_samples,
            windows: config.detection_windows(),
            sample_interval_minutes: config.sample_interval_minutes,
        }
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Detection output for one day window.
///
/// Unlike correction, detection never nulls values, so every search window
/// holds at least its own anchor and no onset is ever left unresolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Events in trough order.
    pub events: Vec<DrinkEvent>,
}

// ============================================================================
// Drink Event Detection Kernel
// ============================================================================

/// Drink event detection kernel.
#[derive(Debug, Clone)]
pub struct DrinkEventDetection {
    metadata: KernelMetadata,
}

impl Default for DrinkEventDetection {
    fn default() -> Self {
        Self::new()
    }
}

impl DrinkEventDetection {
    /// Create a new drink event detection kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: KernelMetadata::batch("behaviour/drink-detection", Domain::DrinkingBehaviour)
                .with_description("Drop-trough-recovery drinking event detection"),
        }
    }

    /// Detect drink events in one day of readings.
    ///
    /// Onsets that resolve to the same trough yield one event. An empty result
    /// is a normal outcome.
    pub fn compute(
        samples: &[TemperatureSample],
        params: &DetectionParams,
        source_id: &str,
    ) -> DetectionResult {
        let window: Vec<TemperatureSample> = samples
            .iter()
            .copied()
            .filter(|s| s.value >= params.detection_floor)
            .collect();
        let values: Vec<f64> = window.iter().map(|s| s.value).collect();
        let len = values.len();
        let w = params.windows;
        let interval = params.sample_interval_minutes;

        let mut result = DetectionResult::default();
        let mut seen_troughs = HashSet::new();

        for onset in event_onsets(&values, params.drop_threshold, params.follow_suppression) {
            let located = clipped_window(onset, w.onset_before, w.onset_after, len)
                .and_then(|(lo, hi)| argmin_in(&values, lo, hi))
                .and_then(|trough| {
                    let (lo, hi) = clipped_window(trough, w.peak_lookback, 0, len)?;
                    let start_peak = argmax_in(&values, lo, hi)?;
                    let (lo, hi) = clipped_window(trough, 0, w.recovery, len)?;
                    let end_peak = argmax_in(&values, lo, hi)?;
                    Some((trough, start_peak, end_peak))
                });

            // Every window contains its finite anchor.
            let Some((trough, start_peak, end_peak)) = located else {
                continue;
            };
            if !seen_troughs.insert(trough) {
                tracing::trace!(onset, trough, "onset shares an already reported trough");
                continue;
            }

            let trough_temp = values[trough];
            let (before_5, before_10) = if trough >= 2 {
                (values[trough - 1], values[trough - 2])
            } else {
                (trough_temp, trough_temp)
            };
            let trough_timestamp = window[trough].timestamp;

            result.events.push(DrinkEvent {
                trough_timestamp,
                hour: trough_timestamp.hour(),
                trough_temp,
                temp_5min_before_trough: before_5,
                temp_10min_before_trough: before_10,
                pre_drink_peak_temp: values[start_peak],
                post_drink_recovery_temp: values[end_peak],
                recovery_minutes: interval * (end_peak - trough) as u32,
                drop_duration_minutes: interval * (trough - start_peak) as u32,
                source_id: source_id.to_string(),
            });
        }

        result.events.sort_by_key(|e| e.trough_timestamp);
        result
    }

    /// Convenience wrapper returning just the events.
    pub fn detect(
        samples: &[TemperatureSample],
        drop_threshold: f64,
        source_id: &str,
    ) -> Vec<DrinkEvent> {
        let params = DetectionParams {
            drop_threshold,
            ..DetectionParams::default()
        };
        Self::compute(samples, &params, source_id).events
    }
}

impl AnalysisKernel for DrinkEventDetection {
    fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchKernel<DrinkDetectionInput, DrinkDetectionOutput> for DrinkEventDetection {
    async fn execute(&self, input: DrinkDetectionInput) -> Result<DrinkDetectionOutput> {
        let start = Instant::now();
        let result = Self::compute(&input.samples, &input.params, &input.source_id);
        Ok(DrinkDetectionOutput {
            result,
            compute_time_us: start.elapsed().as_micros() as u64,
        })
    }

    fn validate_input(&self, input: &DrinkDetectionInput) -> Result<()> {
        if input.params.sample_interval_minutes == 0 {
            return Err(KernelError::validation("sample_interval_minutes must be > 0"));
        }
        if input.params.drop_threshold >= 0.0 {
            return Err(KernelError::validation("drop_threshold must be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(values: &[f64]) -> Vec<TemperatureSample> {
        let base = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TemperatureSample::new(base + Duration::minutes(5 * i as i64), v))
            .collect()
    }

    /// Flat 39 °C, two-sample fall to 34 °C, three-sample recovery to 39 °C.
    fn one_drink() -> Vec<f64> {
        let mut values = vec![39.0; 10];
        values.extend([36.5, 34.0, 35.7, 37.3, 39.0]);
        values.extend(vec![39.0; 30]);
        values
    }

    #[test]
    fn test_drink_detection_metadata() {
        let kernel = DrinkEventDetection::new();
        assert_eq!(kernel.metadata().id, "behaviour/drink-detection");
        assert_eq!(kernel.metadata().domain, Domain::DrinkingBehaviour);
    }

    #[test]
    fn test_single_clean_drink() {
        let samples = series(&one_drink());
        let events = DrinkEventDetection::detect(&samples, -1.0, "S0012");

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.trough_timestamp, samples[11].timestamp);
        assert_eq!(event.trough_temp, 34.0);
        assert_eq!(event.temp_5min_before_trough, 36.5);
        assert_eq!(event.temp_10min_before_trough, 39.0);
        assert_eq!(event.pre_drink_peak_temp, 39.0);
        assert_eq!(event.post_drink_recovery_temp, 39.0);
        // Pre-drink peak is the first 39 °C in the 3-sample lookback (index 8);
        // recovery peak is index 14.
        assert_eq!(event.drop_duration_minutes, 15);
        assert_eq!(event.recovery_minutes, 15);
        assert_eq!(event.hour, 8);
        assert_eq!(event.source_id, "S0012");
        assert!((event.drop_depth() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_interval_scales_minutes() {
        let samples = series(&one_drink());
        let params = DetectionParams {
            sample_interval_minutes: 10,
            ..DetectionParams::default()
        };
        let result = DrinkEventDetection::compute(&samples, &params, "S1");
        assert_eq!(result.events[0].recovery_minutes, 30);
        assert_eq!(result.events[0].drop_duration_minutes, 30);
    }

    #[test]
    fn test_flat_series_has_no_events() {
        let samples = series(&[39.0; 300]);
        assert!(DrinkEventDetection::detect(&samples, -1.0, "S1").is_empty());
    }

    #[test]
    fn test_trough_at_index_one_uses_fallback() {
        let mut values = vec![39.0, 34.0, 36.0, 38.0];
        values.extend(vec![39.0; 30]);
        let events = DrinkEventDetection::detect(&series(&values), -1.0, "S1");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trough_temp, 34.0);
        assert_eq!(events[0].temp_5min_before_trough, 34.0);
        assert_eq!(events[0].temp_10min_before_trough, 34.0);
        assert_eq!(events[0].drop_duration_minutes, 5);
    }

    #[test]
    fn test_trough_at_index_zero_uses_fallback() {
        let mut values = vec![31.0, 38.0, 36.5];
        values.extend(vec![39.0; 30]);
        let events = DrinkEventDetection::detect(&series(&values), -1.0, "S1");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trough_temp, 31.0);
        assert_eq!(events[0].temp_5min_before_trough, 31.0);
        assert_eq!(events[0].temp_10min_before_trough, 31.0);
        assert_eq!(events[0].drop_duration_minutes, 0);
    }

    #[test]
    fn test_readings_below_floor_excluded() {
        let mut values = one_drink();
        values[11] = 29.0;
        let samples = series(&values);
        let events = DrinkEventDetection::detect(&samples, -1.0, "S1");
        // The 29 °C reading is dropped; 35.7 becomes the trough.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trough_temp, 35.7);
    }

    #[test]
    fn test_two_events_in_trough_order() {
        let mut values = one_drink();
        values.extend([36.5, 34.5, 35.7, 37.3, 39.0]);
        values.extend(vec![39.0; 30]);
        let events = DrinkEventDetection::detect(&series(&values), -1.0, "S1");

        assert_eq!(events.len(), 2);
        assert!(events[0].trough_timestamp < events[1].trough_timestamp);
        assert_eq!(events[1].trough_temp, 34.5);
    }

    #[test]
    fn test_shared_trough_reported_once() {
        // Two onsets (indices 2 and 7) both resolve to the trough at 6.
        let mut values = vec![39.0, 39.0, 37.5, 38.8, 39.0, 38.9, 35.0, 37.0, 39.0];
        values.extend(vec![39.0; 30]);
        let samples = series(&values);
        let params = DetectionParams::default();
        let onsets = event_onsets(&values, params.drop_threshold, 2);
        assert_eq!(onsets, vec![2, 7]);

        let result = DrinkEventDetection::compute(&samples, &params, "S1");
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].trough_temp, 35.0);
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let kernel = DrinkEventDetection::new();
        let input = DrinkDetectionInput::new(series(&one_drink()), "S1", DetectionParams::default());
        let output = kernel.execute_validated(input).await.unwrap();
        assert_eq!(output.result.events.len(), 1);

        let bad = DetectionParams {
            sample_interval_minutes: 0,
            ..DetectionParams::default()
        };
        let input = DrinkDetectionInput::new(series(&one_drink()), "S1", bad);
        assert!(kernel.execute_validated(input).await.is_err());
    }
}
