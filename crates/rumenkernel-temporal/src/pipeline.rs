//! Per-animal-day orchestration.
//!
//! Splits an animal's series into calendar days and runs the two independent
//! paths on each day:
//!
//! - cosinor path: floor at `abnormal_low_threshold`, artifact correction,
//!   cosinor fit and percentiles
//! - drinking path: floor at `detection_floor`, drink event detection
//!
//! Anything that goes wrong for one day or one event becomes a [`Diagnostic`]
//! in the [`AnalysisReport`]; processing always moves on.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::correction::{ArtifactCorrection, CorrectionParams};
use crate::cosinor::{CosinorFitting, FitSettings};
use crate::detection::{DetectionParams, DrinkEventDetection};
use crate::messages::{AnimalDayInput, AnimalDayOutput};
use crate::percentile::PercentileExtraction;
use crate::types::{
    animal_group, AnimalSeries, CosinorRecord, DrinkEvent, FitStatus, SeriesWindow,
    TemperatureSample,
};
use rumenkernel_core::{
    config::PipelineConfig,
    domain::Domain,
    error::Result,
    kernel::KernelMetadata,
    traits::{AnalysisKernel, BatchKernel},
};

// ============================================================================
// Diagnostics
// ============================================================================

/// Which analysis a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPath {
    /// Artifact correction, cosinor fit and percentiles.
    Cosinor,
    /// Drink event detection.
    Drinking,
}

impl fmt::Display for AnalysisPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosinor => f.write_str("cosinor"),
            Self::Drinking => f.write_str("drinking"),
        }
    }
}

/// Why an item was skipped or degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Day window below the minimum sample count.
    InsufficientData {
        /// Samples in the window.
        count: usize,
        /// Required samples.
        required: usize,
    },
    /// Cosinor fit produced undefined parameters.
    FitNonConvergence {
        /// Fit outcome.
        status: FitStatus,
    },
    /// A single excursion could not be located.
    EventWindowUndefined {
        /// Onset time.
        onset: NaiveDateTime,
    },
    /// Required input columns were absent.
    MissingColumns {
        /// Missing column names.
        columns: Vec<String>,
    },
    /// The source held no readings at all.
    EmptySeries,
    /// The source file could not be read or parsed.
    SourceUnreadable {
        /// File name.
        file: String,
        /// Underlying error.
        cause: String,
    },
    /// Writing the animal's results failed.
    OutputFailed {
        /// Underlying error.
        cause: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData { count, required } => {
                write!(f, "insufficient data ({count} < {required} samples)")
            }
            Self::FitNonConvergence { status } => write!(f, "cosinor fit undefined: {status}"),
            Self::EventWindowUndefined { onset } => {
                write!(f, "no defined values around onset at {onset}")
            }
            Self::MissingColumns { columns } => {
                write!(f, "missing required columns: {}", columns.join(", "))
            }
            Self::EmptySeries => f.write_str("no readings"),
            Self::SourceUnreadable { file, cause } => write!(f, "cannot read {file}: {cause}"),
            Self::OutputFailed { cause } => write!(f, "failed to write results: {cause}"),
        }
    }
}

/// A skip or failure, identifying the animal, the day and the cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Animal identifier.
    pub animal_id: String,
    /// Day concerned, if the problem is day-specific.
    pub date: Option<NaiveDate>,
    /// Analysis concerned, if the problem is path-specific.
    pub path: Option<AnalysisPath>,
    /// Cause.
    pub reason: SkipReason,
}

impl Diagnostic {
    /// A diagnostic for one path on one day.
    pub fn for_day(
        animal_id: impl Into<String>,
        date: NaiveDate,
        path: AnalysisPath,
        reason: SkipReason,
    ) -> Self {
        Self {
            animal_id: animal_id.into(),
            date: Some(date),
            path: Some(path),
            reason,
        }
    }

    /// A diagnostic for a whole source.
    pub fn for_source(animal_id: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            animal_id: animal_id.into(),
            date: None,
            path: None,
            reason,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "animal {}", self.animal_id)?;
        if let Some(date) = self.date {
            write!(f, " on {date}")?;
        }
        if let Some(path) = self.path {
            write!(f, " [{path}]")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Everything produced for one animal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Animal identifier.
    pub animal_id: String,
    /// Calendar days seen in the input.
    pub days_seen: usize,
    /// One record per day that passed the cosinor gate.
    pub cosinor_records: Vec<CosinorRecord>,
    /// Drink events across all days, in trough order.
    pub drink_events: Vec<DrinkEvent>,
    /// Skips and failures.
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    /// A report for a source that could not be processed at all.
    pub fn skipped(animal_id: impl Into<String>, reason: SkipReason) -> Self {
        let animal_id = animal_id.into();
        Self {
            diagnostics: vec![Diagnostic::for_source(animal_id.clone(), reason)],
            animal_id,
            ..Default::default()
        }
    }

    /// Diagnostics for one path.
    pub fn diagnostics_for(&self, path: AnalysisPath) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.path == Some(path))
    }
}

// ============================================================================
// Animal-Day Pipeline Kernel
// ============================================================================

/// Animal-day pipeline kernel.
#[derive(Debug, Clone)]
pub struct AnimalDayPipeline {
    metadata: KernelMetadata,
}

impl Default for AnimalDayPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimalDayPipeline {
    /// Create a new animal-day pipeline kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: KernelMetadata::batch("pipeline/animal-day", Domain::Pipeline)
                .with_description("Per-day cosinor and drink analysis with diagnostics"),
        }
    }

    /// Analyse every day of one animal's series.
    pub fn compute(series: &AnimalSeries, config: &PipelineConfig) -> AnalysisReport {
        let _span = tracing::info_span!("animal", id = %series.animal_id).entered();

        if series.is_empty() {
            let report = AnalysisReport::skipped(&series.animal_id, SkipReason::EmptySeries);
            for d in &report.diagnostics {
                tracing::warn!("{d}");
            }
            return report;
        }

        let correction = CorrectionParams::from_config(config);
        let detection = DetectionParams::from_config(config);
        let settings = FitSettings::from_config(config);

        let mut report = AnalysisReport {
            animal_id: series.animal_id.clone(),
            ..Default::default()
        };

        for (date, day) in series.split_days() {
            report.days_seen += 1;
            let id = series.animal_id.as_str();

            if let Some(record) = cosinor_day(
                id,
                date,
                day,
                config,
                &correction,
                &settings,
                &mut report.diagnostics,
            ) {
                tracing::info!(
                    date = %date,
                    samples = record.record_num,
                    r_squared = record.fit.r_squared,
                    "cosinor day processed"
                );
                report.cosinor_records.push(record);
            }

            let events = drink_day(id, date, day, config, &detection, &mut report.diagnostics);
            tracing::debug!(date = %date, events = events.len(), "drink detection done");
            report.drink_events.extend(events);
        }

        for d in &report.diagnostics {
            tracing::warn!("{d}");
        }
        report
    }
}

fn cosinor_day(
    animal_id: &str,
    date: NaiveDate,
    day: &[TemperatureSample],
    config: &PipelineConfig,
    correction: &CorrectionParams,
    settings: &FitSettings,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<CosinorRecord> {
    let window = SeriesWindow::at_or_above(date, day, correction.abnormal_low_threshold);
    if !window.is_eligible(config.min_samples_per_day) {
        diagnostics.push(Diagnostic::for_day(
            animal_id,
            date,
            AnalysisPath::Cosinor,
            SkipReason::InsufficientData {
                count: window.len(),
                required: config.min_samples_per_day,
            },
        ));
        return None;
    }

    let corrected = ArtifactCorrection::compute(&window.samples, correction);
    diagnostics.extend(corrected.skipped_onsets.iter().map(|&onset| {
        Diagnostic::for_day(
            animal_id,
            date,
            AnalysisPath::Cosinor,
            SkipReason::EventWindowUndefined { onset },
        )
    }));

    let fit = CosinorFitting::fit_samples(corrected.defined(), settings);
    if !fit.is_defined() {
        diagnostics.push(Diagnostic::for_day(
            animal_id,
            date,
            AnalysisPath::Cosinor,
            SkipReason::FitNonConvergence { status: fit.status },
        ));
    }

    let values: Vec<f64> = corrected.defined().map(|s| s.value).collect();
    let percentiles = PercentileExtraction::compute(&values, &config.cosinor.percentiles);

    Some(CosinorRecord {
        group: animal_group(animal_id),
        animal_id: animal_id.to_string(),
        record_date: date,
        record_num: window.len(),
        fit,
        percentiles,
    })
}

fn drink_day(
    animal_id: &str,
    date: NaiveDate,
    day: &[TemperatureSample],
    config: &PipelineConfig,
    detection: &DetectionParams,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<DrinkEvent> {
    let window = SeriesWindow::at_or_above(date, day, detection.detection_floor);
    if !window.is_eligible(config.min_samples_per_day) {
        diagnostics.push(Diagnostic::for_day(
            animal_id,
            date,
            AnalysisPath::Drinking,
            SkipReason::InsufficientData {
                count: window.len(),
                required: config.min_samples_per_day,
            },
        ));
        return Vec::new();
    }

    DrinkEventDetection::compute(&window.samples, detection, animal_id).events
}

impl AnalysisKernel for AnimalDayPipeline {
    fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchKernel<AnimalDayInput, AnimalDayOutput> for AnimalDayPipeline {
    async fn execute(&self, input: AnimalDayInput) -> Result<AnimalDayOutput> {
        let start = Instant::now();
        let report = Self::compute(&input.series, &input.config);
        Ok(AnimalDayOutput {
            report,
            compute_time_us: start.elapsed().as_micros() as u64,
        })
    }

    fn validate_input(&self, input: &AnimalDayInput) -> Result<()> {
        input.config.validate()?;
        Ok(())
    }
}
