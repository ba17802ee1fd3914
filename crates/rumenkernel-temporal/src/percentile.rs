//! Percentile extraction kernel.
//!
//! Low/high values at a rank are robust stand-ins for the daily minimum and
//! maximum.

use std::time::Instant;

use async_trait::async_trait;

use crate::messages::{PercentileExtractionInput, PercentileExtractionOutput};
use crate::types::PercentileReading;
use rumenkernel_core::{
    domain::Domain,
    error::{KernelError, Result},
    kernel::KernelMetadata,
    traits::{AnalysisKernel, BatchKernel},
};

/// Percentile extraction kernel.
#[derive(Debug, Clone)]
pub struct PercentileExtraction {
    metadata: KernelMetadata,
}

impl Default for PercentileExtraction {
    fn default() -> Self {
        Self::new()
    }
}

impl PercentileExtraction {
    /// Create a new percentile extraction kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: KernelMetadata::batch(
                "circadian/percentile-extraction",
                Domain::CircadianRhythm,
            )
            .with_description("Low/high values at fixed percentile ranks"),
        }
    }

    /// Values at rank `floor(percentile·n)` of the ascending and descending sorts.
    ///
    /// Non-finite values are ignored. Both sides are `NaN` when nothing is left
    /// or the rank falls outside the data.
    pub fn extract(values: &[f64], percentile: f64) -> PercentileReading {
        let sorted = sorted_finite(values);
        Self::extract_sorted(&sorted, percentile)
    }

    /// Extract several percentiles with a single sort.
    pub fn compute(values: &[f64], percentiles: &[f64]) -> Vec<PercentileReading> {
        let sorted = sorted_finite(values);
        percentiles
            .iter()
            .map(|&p| Self::extract_sorted(&sorted, p))
            .collect()
    }

    fn extract_sorted(sorted: &[f64], percentile: f64) -> PercentileReading {
        let n = sorted.len();
        let rank = (percentile * n as f64).floor();
        let (low, high) = if n == 0 || !(rank >= 0.0) || rank >= n as f64 {
            (f64::NAN, f64::NAN)
        } else {
            let k = rank as usize;
            (sorted[k], sorted[n - 1 - k])
        };
        PercentileReading {
            percentile,
            low,
            high,
        }
    }
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

impl AnalysisKernel for PercentileExtraction {
    fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchKernel<PercentileExtractionInput, PercentileExtractionOutput> for PercentileExtraction {
    async fn execute(
        &self,
        input: PercentileExtractionInput,
    ) -> Result<PercentileExtractionOutput> {
        let start = Instant::now();
        let readings = Self::compute(&input.values, &input.percentiles);
        Ok(PercentileExtractionOutput {
            readings,
            compute_time_us: start.elapsed().as_micros() as u64,
        })
    }

    fn validate_input(&self, input: &PercentileExtractionInput) -> Result<()> {
        match input.percentiles.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            Some(p) => Err(KernelError::validation(format!(
                "percentile {p} is outside (0, 1]"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 36.0 + i as f64 * 0.01).collect()
    }

    #[test]
    fn test_percentile_extraction_metadata() {
        let kernel = PercentileExtraction::new();
        assert_eq!(kernel.metadata().id, "circadian/percentile-extraction");
    }

    #[test]
    fn test_rank_arithmetic() {
        let values = ramp(100);
        let reading = PercentileExtraction::extract(&values, 0.05);
        assert_eq!(reading.low, values[5]);
        assert_eq!(reading.high, values[94]);

        let reading = PercentileExtraction::extract(&[1.0, 2.0, 3.0], 0.45);
        // floor(1.35) = 1
        assert_eq!((reading.low, reading.high), (2.0, 2.0));
    }

    #[test]
    fn test_order_independent() {
        let values = ramp(288);
        let mut shuffled = values.clone();
        shuffled.reverse();
        shuffled.swap(3, 200);
        shuffled.swap(17, 101);

        for p in [0.01, 0.05, 0.10, 0.20, 0.30, 0.40, 0.45] {
            assert_eq!(
                PercentileExtraction::extract(&values, p),
                PercentileExtraction::extract(&shuffled, p)
            );
        }
        // Repeat calls agree.
        assert_eq!(
            PercentileExtraction::compute(&values, &[0.1, 0.2]),
            PercentileExtraction::compute(&values, &[0.1, 0.2])
        );
    }

    #[test]
    fn test_undefined_cases() {
        let empty = PercentileExtraction::extract(&[], 0.1);
        assert!(empty.low.is_nan() && empty.high.is_nan());

        let full = PercentileExtraction::extract(&[1.0, 2.0], 1.0);
        assert!(full.low.is_nan() && full.high.is_nan());

        let nan_only = PercentileExtraction::extract(&[f64::NAN, f64::NAN], 0.1);
        assert!(nan_only.low.is_nan());
    }

    #[test]
    fn test_nan_values_skipped() {
        let reading = PercentileExtraction::extract(&[f64::NAN, 3.0, 1.0, f64::NAN, 2.0], 0.4);
        // Three finite values: rank floor(1.2) = 1.
        assert_eq!((reading.low, reading.high), (2.0, 2.0));
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let kernel = PercentileExtraction::new();
        let output = kernel
            .execute_validated(PercentileExtractionInput::new(ramp(10), vec![0.1, 0.2]))
            .await
            .unwrap();
        assert_eq!(output.readings.len(), 2);
        assert_eq!(output.readings[0].low, ramp(10)[1]);

        let bad = PercentileExtractionInput::new(ramp(10), vec![0.0]);
        assert!(kernel.execute_validated(bad).await.is_err());
    }
}
