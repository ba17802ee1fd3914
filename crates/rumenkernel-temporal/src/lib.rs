//! # RumenKernel Temporal Analysis
//!
//! Signal-processing kernels for rumen/vaginal temperature logger series.
//!
//! ## Kernels
//!
//! ### Signal conditioning (1 kernel)
//! - `ArtifactCorrection` - Windowed local-extrema artifact removal with interpolation
//!
//! ### Circadian rhythm (2 kernels)
//! - `CosinorFitting` - 24-hour cosinor fit with r²
//! - `PercentileExtraction` - Low/high values at fixed percentile ranks
//!
//! ### Drinking behaviour (1 kernel)
//! - `DrinkEventDetection` - Drop-trough-recovery event detection
//!
//! ### Pipeline (1 kernel)
//! - `AnimalDayPipeline` - Per-day orchestration of both paths with diagnostics
//!
//! Every `compute` function is pure over its input, so callers can run
//! animals or days in parallel without coordination.

#![warn(missing_docs)]

pub mod correction;
pub mod cosinor;
pub mod curve;
pub mod detection;
pub mod drops;
pub mod messages;
pub mod percentile;
pub mod pipeline;
pub mod types;

pub use correction::{ArtifactCorrection, CorrectionParams, CorrectionResult};
pub use cosinor::{CosinorFitting, FitSettings};
pub use curve::{compute_curve, consecutive_curves, CurveLayout, CurveSeries};
pub use detection::{DetectionParams, DetectionResult, DrinkEventDetection};
pub use percentile::PercentileExtraction;
pub use pipeline::{AnalysisPath, AnalysisReport, AnimalDayPipeline, Diagnostic, SkipReason};
pub use types::{
    AnimalSeries, CosinorFit, CosinorRecord, DrinkEvent, FitStatus, PercentileReading,
    SeriesWindow, TemperatureSample,
};

use rumenkernel_core::{registry::KernelRegistry, traits::AnalysisKernel};

/// Register all analysis kernels.
pub fn register_all(registry: &KernelRegistry) -> rumenkernel_core::error::Result<()> {
    tracing::info!("Registering temperature analysis kernels");

    registry.register(ArtifactCorrection::new().metadata().clone())?;
    registry.register(CosinorFitting::new().metadata().clone())?;
    registry.register(PercentileExtraction::new().metadata().clone())?;
    registry.register(DrinkEventDetection::new().metadata().clone())?;
    registry.register(AnimalDayPipeline::new().metadata().clone())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumenkernel_core::domain::Domain;

    #[test]
    fn test_register_all() {
        let registry = KernelRegistry::new();
        register_all(&registry).unwrap();

        assert_eq!(registry.total_count(), 5);
        assert_eq!(registry.by_domain(Domain::CircadianRhythm).len(), 2);
        assert!(registry.contains("behaviour/drink-detection"));
        // A second registration is rejected.
        assert!(register_all(&registry).is_err());
    }
}
