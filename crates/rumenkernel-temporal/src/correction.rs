//! Artifact correction kernel.
//!
//! Sensor faults show up as a sharp drop that is not sustained. The corrector
//! finds the trough of each such excursion, nulls everything strictly between
//! the surrounding peaks and then fills interior gaps by time-weighted linear
//! interpolation.

use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::drops::{argmax_in, argmin_in, clipped_window, event_onsets};
use crate::messages::{ArtifactCorrectionInput, ArtifactCorrectionOutput};
use crate::types::TemperatureSample;
use rumenkernel_core::{
    config::{CorrectionWindows, PipelineConfig},
    domain::Domain,
    error::{KernelError, Result},
    kernel::KernelMetadata,
    traits::{AnalysisKernel, BatchKernel},
};

// ============================================================================
// Parameters and Results
// ============================================================================

/// Artifact correction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionParams {
    /// Readings below this temperature are discarded before scanning.
    pub abnormal_low_threshold: f64,
    /// Drop threshold for one- and two-step differences.
    pub drop_threshold: f64,
    /// Follow-up positions that suppress an onset.
    pub follow_suppression: usize,
    /// Search windows in samples.
    pub windows: CorrectionWindows,
}

impl CorrectionParams {
    /// Derive parameters from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            abnormal_low_threshold: config.correction.abnormal_low_threshold,
            drop_threshold: config.correction.drop_threshold,
            follow_suppression: config.correction.follow_suppression_samples,
            windows: config.correction_windows(),
        }
    }

    /// Override the thresholds, keeping the default windows.
    pub fn with_thresholds(abnormal_low_threshold: f64, drop_threshold: f64) -> Self {
        Self {
            abnormal_low_threshold,
            drop_threshold,
            ..Self::default()
        }
    }
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// One excursion removed by the corrector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedExcursion {
    /// Onset position within the window.
    pub onset: usize,
    /// Trough position.
    pub trough: usize,
    /// Pre-drop peak position (kept).
    pub start_peak: usize,
    /// Recovery peak position (kept).
    pub end_peak: usize,
}

impl CorrectedExcursion {
    /// Number of samples nulled.
    pub fn nulled(&self) -> usize {
        self.end_peak.saturating_sub(self.start_peak + 1)
    }
}

/// Correction output for one day window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    /// Samples at or above the floor, corrected. Edge gaps without a defined
    /// neighbour on both sides stay `NaN`.
    pub samples: Vec<TemperatureSample>,
    /// Excursions removed, in onset order.
    pub excursions: Vec<CorrectedExcursion>,
    /// Onsets whose windows held no defined value.
    pub skipped_onsets: Vec<NaiveDateTime>,
}

impl CorrectionResult {
    /// Corrected samples that hold a value.
    pub fn defined(&self) -> impl Iterator<Item = &TemperatureSample> {
        self.samples.iter().filter(|s| s.is_defined())
    }

    /// Count of samples left undefined after interpolation.
    pub fn undefined_count(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_defined()).count()
    }
}

// ============================================================================
// Artifact Correction Kernel
// ============================================================================

/// Artifact correction kernel.
///
/// Removes sharp, unsustained drops caused by sensor faults and interpolates
/// the resulting gaps.
#[derive(Debug, Clone)]
pub struct ArtifactCorrection {
    metadata: KernelMetadata,
}

impl Default for ArtifactCorrection {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactCorrection {
    /// Create a new artifact correction kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: KernelMetadata::batch("signal/artifact-correction", Domain::SignalConditioning)
                .with_description("Windowed local-extrema artifact removal with interpolation"),
        }
    }

    /// Correct a day's samples.
    ///
    /// Onsets are found once on the filtered values; excursions are then nulled
    /// in onset order, so a later search sees the gaps left by earlier ones.
    pub fn compute(samples: &[TemperatureSample], params: &CorrectionParams) -> CorrectionResult {
        let mut window: Vec<TemperatureSample> = samples
            .iter()
            .copied()
            .filter(|s| s.value >= params.abnormal_low_threshold)
            .collect();
        let mut values: Vec<f64> = window.iter().map(|s| s.value).collect();
        let len = values.len();

        let onsets = event_onsets(&values, params.drop_threshold, params.follow_suppression);
        let w = params.windows;

        let mut excursions = Vec::with_capacity(onsets.len());
        let mut skipped_onsets = Vec::new();

        for onset in onsets {
            let located = clipped_window(onset, w.onset_before, w.onset_after, len)
                .and_then(|(lo, hi)| argmin_in(&values, lo, hi))
                .and_then(|trough| {
                    let (lo, hi) = clipped_window(trough, w.peak_before, w.peak_after, len)?;
                    let start_peak = argmax_in(&values, lo, hi)?;
                    let (lo, hi) = clipped_window(trough, 0, w.recovery, len)?;
                    let end_peak = argmax_in(&values, lo, hi)?;
                    Some(CorrectedExcursion {
                        onset,
                        trough,
                        start_peak,
                        end_peak,
                    })
                });

            match located {
                Some(excursion) => {
                    for v in values
                        .iter_mut()
                        .take(excursion.end_peak)
                        .skip(excursion.start_peak + 1)
                    {
                        *v = f64::NAN;
                    }
                    tracing::trace!(
                        onset,
                        trough = excursion.trough,
                        nulled = excursion.nulled(),
                        "artifact excursion nulled"
                    );
                    excursions.push(excursion);
                }
                None => skipped_onsets.push(window[onset].timestamp),
            }
        }

        for (sample, v) in window.iter_mut().zip(&values) {
            sample.value = *v;
        }
        interpolate_interior(&mut window);

        CorrectionResult {
            samples: window,
            excursions,
            skipped_onsets,
        }
    }

    /// Convenience wrapper returning just the corrected samples.
    pub fn correct(
        samples: &[TemperatureSample],
        abnormal_low_threshold: f64,
        drop_threshold: f64,
    ) -> Vec<TemperatureSample> {
        Self::compute(
            samples,
            &CorrectionParams::with_thresholds(abnormal_low_threshold, drop_threshold),
        )
        .samples
    }
}

/// Fill every gap that has a defined neighbour on both sides, weighting by time.
///
/// Leading and trailing gaps are left as they are.
pub fn interpolate_interior(samples: &mut [TemperatureSample]) {
    let mut prev: Option<usize> = None;
    for i in 0..samples.len() {
        if !samples[i].is_defined() {
            continue;
        }
        if let Some(p) = prev {
            if i > p + 1 {
                let (t0, v0) = (samples[p].timestamp, samples[p].value);
                let (t1, v1) = (samples[i].timestamp, samples[i].value);
                let span = (t1 - t0).num_milliseconds() as f64;
                for j in (p + 1)..i {
                    let frac = if span > 0.0 {
                        (samples[j].timestamp - t0).num_milliseconds() as f64 / span
                    } else {
                        (j - p) as f64 / (i - p) as f64
                    };
                    samples[j].value = v0 + (v1 - v0) * frac;
                }
            }
        }
        prev = Some(i);
    }
}

impl AnalysisKernel for ArtifactCorrection {
    fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchKernel<ArtifactCorrectionInput, ArtifactCorrectionOutput> for ArtifactCorrection {
    async fn execute(&self, input: ArtifactCorrectionInput) -> Result<ArtifactCorrectionOutput> {
        let start = Instant::now();
        let result = Self::compute(&input.samples, &input.params);
        Ok(ArtifactCorrectionOutput {
            result,
            compute_time_us: start.elapsed().as_micros() as u64,
        })
    }

    fn validate_input(&self, input: &ArtifactCorrectionInput) -> Result<()> {
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
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TemperatureSample::new(base + Duration::minutes(5 * i as i64), v))
            .collect()
    }

    fn values(samples: &[TemperatureSample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_artifact_corrector_metadata() {
        let kernel = ArtifactCorrection::new();
        assert_eq!(kernel.metadata().id, "signal/artifact-correction");
        assert_eq!(kernel.metadata().domain, Domain::SignalConditioning);
    }

    #[test]
    fn test_flat_series_unchanged() {
        let input = series(&[38.5; 40]);
        let result = ArtifactCorrection::compute(&input, &CorrectionParams::default());
        assert_eq!(result.samples, input);
        assert!(result.excursions.is_empty());
    }

    #[test]
    fn test_removes_excursion_and_interpolates() {
        let mut raw = vec![39.0; 40];
        raw[10] = 38.0;
        raw[11] = 37.0;
        raw[12] = 38.2;
        raw[13] = 38.9;
        let result = ArtifactCorrection::compute(&series(&raw), &CorrectionParams::default());

        assert_eq!(result.excursions.len(), 1);
        let excursion = result.excursions[0];
        assert_eq!(excursion.trough, 11);
        assert_eq!(result.undefined_count(), 0);
        // Nulled samples sit between two 39.0 peaks, so interpolation is flat.
        for v in values(&result.samples) {
            assert!((v - 39.0).abs() < 1e-12, "unexpected value {v}");
        }
    }

    #[test]
    fn test_abnormal_low_readings_dropped() {
        let mut raw = vec![39.0; 20];
        raw[5] = 20.0;
        raw[6] = 34.0;
        let result = ArtifactCorrection::compute(&series(&raw), &CorrectionParams::default());
        assert_eq!(result.samples.len(), 18);
        assert!(result.samples.iter().all(|s| s.value >= 35.0));
    }

    #[test]
    fn test_interior_gaps_fully_interpolated() {
        let mut input = series(&[38.0, 38.5, 39.0, 39.5, 40.0]);
        input[1].value = f64::NAN;
        input[2].value = f64::NAN;
        input[3].value = f64::NAN;
        interpolate_interior(&mut input);
        assert_eq!(values(&input), vec![38.0, 38.5, 39.0, 39.5, 40.0]);
    }

    #[test]
    fn test_interpolation_weights_by_time() {
        let mut input = series(&[38.0, f64::NAN, 40.0]);
        // Irregular spacing: the middle reading sits a quarter of the way in.
        input[2].timestamp = input[0].timestamp + Duration::minutes(20);
        interpolate_interior(&mut input);
        assert!((input[1].value - 38.5).abs() < 1e-12);
    }

    #[test]
    fn test_edge_gaps_left_undefined() {
        let mut input = series(&[f64::NAN, 38.0, f64::NAN, 39.0, f64::NAN]);
        interpolate_interior(&mut input);
        assert!(input[0].value.is_nan());
        assert!((input[2].value - 38.5).abs() < 1e-12);
        assert!(input[4].value.is_nan());
    }

    #[test]
    fn test_windows_clip_at_series_start() {
        // Drop right at the start: every search window runs past index 0.
        let mut raw = vec![39.0; 30];
        raw[1] = 37.5;
        let result = ArtifactCorrection::compute(&series(&raw), &CorrectionParams::default());
        assert_eq!(result.excursions.len(), 1);
        assert_eq!(result.excursions[0].trough, 1);
        assert_eq!(result.excursions[0].start_peak, 0);
        assert_eq!(result.undefined_count(), 0);
    }

    #[test]
    fn test_undefined_onset_skipped_later_one_corrected() {
        // The first excursion nulls 2..=7, which swallows the second onset (7).
        // With a zero-width onset window that onset has nothing to search and
        // is skipped; the third onset is still corrected.
        let mut raw = vec![39.0; 25];
        raw[4..10].copy_from_slice(&[38.0, 38.6, 38.7, 38.1, 38.9, 39.0]);
        raw[15] = 38.0;
        let input = series(&raw);
        let params = CorrectionParams {
            windows: CorrectionWindows {
                onset_before: 0,
                onset_after: 0,
                peak_before: 3,
                peak_after: 0,
                recovery: 4,
            },
            ..CorrectionParams::default()
        };
        let result = ArtifactCorrection::compute(&input, &params);

        assert_eq!(result.skipped_onsets, vec![input[7].timestamp]);
        assert_eq!(
            result.excursions,
            vec![
                CorrectedExcursion {
                    onset: 4,
                    trough: 4,
                    start_peak: 1,
                    end_peak: 8
                },
                CorrectedExcursion {
                    onset: 15,
                    trough: 15,
                    start_peak: 12,
                    end_peak: 16
                },
            ]
        );
        assert_eq!(result.undefined_count(), 0);
        assert!((result.samples[15].value - 39.0).abs() < 1e-12);
    }

    #[test]
    fn test_correct_wrapper_thresholds() {
        let mut raw = vec![39.0; 30];
        raw[15] = 38.4;
        // -0.6 step: removed at -0.5, kept at -0.8.
        let strict = ArtifactCorrection::correct(&series(&raw), 35.0, -0.5);
        assert!((strict[15].value - 39.0).abs() < 1e-12);
        let loose = ArtifactCorrection::correct(&series(&raw), 35.0, -0.8);
        assert!((loose[15].value - 38.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let kernel = ArtifactCorrection::new();
        let input = ArtifactCorrectionInput::new(series(&[39.0; 10]), CorrectionParams::default());
        let output = kernel.execute_validated(input).await.unwrap();
        assert_eq!(output.result.samples.len(), 10);

        let bad = CorrectionParams {
            drop_threshold: 0.5,
            ..CorrectionParams::default()
        };
        let input = ArtifactCorrectionInput::new(series(&[39.0; 10]), bad);
        assert!(kernel.execute_validated(input).await.is_err());
    }
}
