//! Message types for the analysis kernels.
//!
//! Input/output message types for the `BatchKernel` trait implementations.

use serde::{Deserialize, Serialize};

use crate::correction::{CorrectionParams, CorrectionResult};
use crate::cosinor::FitSettings;
use crate::detection::{DetectionParams, DetectionResult};
use crate::pipeline::AnalysisReport;
use crate::types::{AnimalSeries, CosinorFit, PercentileReading, TemperatureSample};
use rumenkernel_core::config::PipelineConfig;

// ============================================================================
// Artifact Correction Messages
// ============================================================================

/// Input for artifact correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCorrectionInput {
    /// One day of readings.
    pub samples: Vec<TemperatureSample>,
    /// Correction parameters.
    pub params: CorrectionParams,
}

impl ArtifactCorrectionInput {
    /// Create a new artifact correction input.
    pub fn new(samples: Vec<TemperatureSample>, params: CorrectionParams) -> Self {
        Self { samples, params }
    }
}

/// Output from artifact correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCorrectionOutput {
    /// Corrected samples and removed excursions.
    pub result: CorrectionResult,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Cosinor Fit Messages
// ============================================================================

/// Input for cosinor fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosinorFitInput {
    /// Sample times in hours.
    pub times_hours: Vec<f64>,
    /// Sample values.
    pub values: Vec<f64>,
    /// Optimizer settings.
    pub settings: FitSettings,
}

impl CosinorFitInput {
    /// Create a new cosinor fit input.
    pub fn new(times_hours: Vec<f64>, values: Vec<f64>, settings: FitSettings) -> Self {
        Self {
            times_hours,
            values,
            settings,
        }
    }
}

/// Output from cosinor fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosinorFitOutput {
    /// Fitted parameters.
    pub fit: CosinorFit,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Percentile Extraction Messages
// ============================================================================

/// Input for percentile extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileExtractionInput {
    /// Values to rank.
    pub values: Vec<f64>,
    /// Percentiles as fractions in (0, 1].
    pub percentiles: Vec<f64>,
}

impl PercentileExtractionInput {
    /// Create a new percentile extraction input.
    pub fn new(values: Vec<f64>, percentiles: Vec<f64>) -> Self {
        Self {
            values,
            percentiles,
        }
    }
}

/// Output from percentile extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileExtractionOutput {
    /// One reading per requested percentile.
    pub readings: Vec<PercentileReading>,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Drink Detection Messages
// ============================================================================

/// Input for drink event detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinkDetectionInput {
    /// One day of readings.
    pub samples: Vec<TemperatureSample>,
    /// Animal identifier stamped on each event.
    pub source_id: String,
    /// Detection parameters.
    pub params: DetectionParams,
}

impl DrinkDetectionInput {
    /// Create a new drink detection input.
    pub fn new(
        samples: Vec<TemperatureSample>,
        source_id: impl Into<String>,
        params: DetectionParams,
    ) -> Self {
        Self {
            samples,
            source_id: source_id.into(),
            params,
        }
    }
}

/// Output from drink event detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinkDetectionOutput {
    /// Detected events.
    pub result: DetectionResult,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Animal-Day Pipeline Messages
// ============================================================================

/// Input for the animal-day pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalDayInput {
    /// Full series for one animal.
    pub series: AnimalSeries,
    /// Pipeline configuration.
    pub config: PipelineConfig,
}

impl AnimalDayInput {
    /// Create a new animal-day input.
    pub fn new(series: AnimalSeries, config: PipelineConfig) -> Self {
        Self { series, config }
    }
}

/// Output from the animal-day pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalDayOutput {
    /// Records, events and diagnostics for the animal.
    pub report: AnalysisReport,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}
