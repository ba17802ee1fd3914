//! Pipeline Configuration
//!
//! Unified configuration for the analysis kernels, supporting:
//! - Programmatic configuration via builders and presets
//! - Environment variable overrides (`RUMENKERNEL_*`)
//! - File-based configuration (TOML/JSON)
//!
//! Window spans are expressed in minutes and converted to sample counts through
//! `sample_interval_minutes`, so the kernels keep working when the logger cadence
//! changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use rumenkernel_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_file("config/pipeline.toml")?.with_env_overrides();
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default percentiles reported alongside each cosinor fit, as fractions.
pub const DEFAULT_PERCENTILES: [f64; 7] = [0.01, 0.05, 0.10, 0.20, 0.30, 0.40, 0.45];

/// A search window around an anchor sample, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpan {
    /// Minutes before the anchor.
    pub before_minutes: u32,
    /// Minutes after the anchor.
    pub after_minutes: u32,
}

impl WindowSpan {
    /// Create a new window span.
    pub const fn new(before_minutes: u32, after_minutes: u32) -> Self {
        Self {
            before_minutes,
            after_minutes,
        }
    }

    /// Number of samples before the anchor at the given cadence.
    pub fn samples_before(&self, interval_minutes: u32) -> usize {
        minutes_to_samples(self.before_minutes, interval_minutes)
    }

    /// Number of samples after the anchor at the given cadence.
    pub fn samples_after(&self, interval_minutes: u32) -> usize {
        minutes_to_samples(self.after_minutes, interval_minutes)
    }
}

/// Convert a span in minutes to a sample count, rounding to the nearest sample.
pub fn minutes_to_samples(minutes: u32, interval_minutes: u32) -> usize {
    if interval_minutes == 0 {
        return 0;
    }
    ((minutes + interval_minutes / 2) / interval_minutes) as usize
}

/// Artifact correction settings (cosinor path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Readings below this temperature (°C) are sensor-fault floor readings.
    pub abnormal_low_threshold: f64,
    /// A one- or two-step difference below this value (°C) is a significant drop.
    pub drop_threshold: f64,
    /// A drop followed by another drop within this many samples is not an onset.
    pub follow_suppression_samples: usize,
    /// Window around an onset searched for the trough.
    pub onset_window: WindowSpan,
    /// Window around the trough searched for the pre-drop peak.
    pub peak_window: WindowSpan,
    /// Span after the trough searched for the recovery peak, in minutes.
    pub recovery_minutes: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            abnormal_low_threshold: 35.0,
            drop_threshold: -0.5,
            follow_suppression_samples: 2,
            onset_window: WindowSpan::new(50, 100),
            peak_window: WindowSpan::new(50, 25),
            recovery_minutes: 100,
        }
    }
}

/// Drink event detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Readings below this temperature (°C) are excluded from the event path.
    pub detection_floor: f64,
    /// A one- or two-step difference below this value (°C) is a significant drop.
    pub drop_threshold: f64,
    /// A drop followed by another drop within this many samples is not an onset.
    pub follow_suppression_samples: usize,
    /// Window around an onset searched for the trough.
    pub onset_window: WindowSpan,
    /// Span before the trough searched for the pre-drink peak, in minutes.
    pub peak_lookback_minutes: u32,
    /// Span after the trough searched for the recovery peak, in minutes.
    pub recovery_minutes: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            detection_floor: 30.0,
            drop_threshold: -1.0,
            follow_suppression_samples: 2,
            onset_window: WindowSpan::new(25, 100),
            peak_lookback_minutes: 15,
            recovery_minutes: 150,
        }
    }
}

/// Cosinor fit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosinorConfig {
    /// Rhythm period in hours.
    pub period_hours: f64,
    /// Iteration cap for the least-squares optimizer.
    pub max_iterations: usize,
    /// Relative change in residual sum of squares treated as converged.
    pub tolerance: f64,
    /// Percentiles (fractions in (0, 1]) reported with each fit.
    pub percentiles: Vec<f64>,
}

impl Default for CosinorConfig {
    fn default() -> Self {
        Self {
            period_hours: 24.0,
            max_iterations: 200,
            tolerance: 1e-10,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}

/// Unified pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal logger cadence in minutes
    pub sample_interval_minutes: u32,
    /// Minimum samples a day window needs to be analysed
    pub min_samples_per_day: usize,
    /// Artifact correction settings
    pub correction: CorrectionConfig,
    /// Drink detection settings
    pub detection: DetectionConfig,
    /// Cosinor settings
    pub cosinor: CosinorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval_minutes: 5,
            min_samples_per_day: 280,
            correction: CorrectionConfig::default(),
            detection: DetectionConfig::default(),
            cosinor: CosinorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Field-trial preset: a stricter correction threshold for noisier loggers.
    pub fn field_trial() -> Self {
        Self {
            correction: CorrectionConfig {
                drop_threshold: -0.8,
                ..CorrectionConfig::default()
            },
            ..Default::default()
        }
    }

    /// Testing preset: a small day minimum so synthetic series stay short.
    pub fn testing() -> Self {
        Self {
            min_samples_per_day: 3,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base = match std::env::var("RUMENKERNEL_PRESET").as_deref() {
            Ok("field-trial") | Ok("field_trial") => Self::field_trial(),
            Ok("testing") => Self::testing(),
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Apply `RUMENKERNEL_*` environment overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("RUMENKERNEL_SAMPLE_INTERVAL_MINUTES") {
            self.sample_interval_minutes = val.parse().unwrap_or(self.sample_interval_minutes);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_MIN_SAMPLES_PER_DAY") {
            self.min_samples_per_day = val.parse().unwrap_or(self.min_samples_per_day);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_ABNORMAL_LOW_THRESHOLD") {
            self.correction.abnormal_low_threshold =
                val.parse().unwrap_or(self.correction.abnormal_low_threshold);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_DROP_THRESHOLD_CORRECTION") {
            self.correction.drop_threshold = val.parse().unwrap_or(self.correction.drop_threshold);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_DETECTION_FLOOR") {
            self.detection.detection_floor =
                val.parse().unwrap_or(self.detection.detection_floor);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_DROP_THRESHOLD_DETECTION") {
            self.detection.drop_threshold = val.parse().unwrap_or(self.detection.drop_threshold);
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_PERCENTILES") {
            if let Some(percentiles) = parse_percentile_list(&val) {
                self.cosinor.percentiles = percentiles;
            }
        }
        if let Ok(val) = std::env::var("RUMENKERNEL_MAX_ITERATIONS") {
            self.cosinor.max_iterations = val.parse().unwrap_or(self.cosinor.max_iterations);
        }
        self
    }

    /// Load configuration from a TOML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        match ext {
            "json" => serde_json::from_str(&contents).map_err(ConfigError::JsonError),
            "toml" => toml::from_str(&contents).map_err(ConfigError::TomlError),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerializeError)
    }

    /// Create a builder for this configuration
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue(
                "sample_interval_minutes must be > 0".to_string(),
            ));
        }
        if self.min_samples_per_day < 3 {
            return Err(ConfigError::InvalidValue(
                "min_samples_per_day must be >= 3".to_string(),
            ));
        }
        if !self.correction.abnormal_low_threshold.is_finite()
            || !self.detection.detection_floor.is_finite()
        {
            return Err(ConfigError::InvalidValue(
                "temperature floors must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("correction.drop_threshold", self.correction.drop_threshold),
            ("detection.drop_threshold", self.detection.drop_threshold),
        ] {
            if !(value < 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be negative, got {value}"
                )));
            }
        }
        if !(self.cosinor.period_hours > 0.0) {
            return Err(ConfigError::InvalidValue(
                "cosinor.period_hours must be > 0".to_string(),
            ));
        }
        if self.cosinor.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "cosinor.max_iterations must be > 0".to_string(),
            ));
        }
        if let Some(p) = self
            .cosinor
            .percentiles
            .iter()
            .find(|p| !(**p > 0.0 && **p <= 1.0))
        {
            return Err(ConfigError::InvalidValue(format!(
                "percentile {p} is outside (0, 1]"
            )));
        }
        Ok(())
    }

    /// Sample counts for the correction windows at this configuration's cadence
    pub fn correction_windows(&self) -> CorrectionWindows {
        let interval = self.sample_interval_minutes;
        CorrectionWindows {
            onset_before: self.correction.onset_window.samples_before(interval),
            onset_after: self.correction.onset_window.samples_after(interval),
            peak_before: self.correction.peak_window.samples_before(interval),
            peak_after: self.correction.peak_window.samples_after(interval),
            recovery: minutes_to_samples(self.correction.recovery_minutes, interval),
        }
    }

    /// Sample counts for the detection windows at this configuration's cadence
    pub fn detection_windows(&self) -> DetectionWindows {
        let interval = self.sample_interval_minutes;
        DetectionWindows {
            onset_before: self.detection.onset_window.samples_before(interval),
            onset_after: self.detection.onset_window.samples_after(interval),
            peak_lookback: minutes_to_samples(self.detection.peak_lookback_minutes, interval),
            recovery: minutes_to_samples(self.detection.recovery_minutes, interval),
        }
    }
}

/// Correction windows in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionWindows {
    /// Samples before an onset searched for the trough.
    pub onset_before: usize,
    /// Samples after an onset searched for the trough.
    pub onset_after: usize,
    /// Samples before the trough searched for the pre-drop peak.
    pub peak_before: usize,
    /// Samples after the trough searched for the pre-drop peak.
    pub peak_after: usize,
    /// Samples after the trough searched for the recovery peak.
    pub recovery: usize,
}

/// Detection windows in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionWindows {
    /// Samples before an onset searched for the trough.
    pub onset_before: usize,
    /// Samples after an onset searched for the trough.
    pub onset_after: usize,
    /// Samples before the trough searched for the pre-drink peak.
    pub peak_lookback: usize,
    /// Samples after the trough searched for the recovery peak.
    pub recovery: usize,
}

/// Parse a comma-separated list of percentiles.
///
/// Values above 1 are read as percentages (`"1,5,10"` and `"0.01,0.05,0.1"` agree).
pub fn parse_percentile_list(s: &str) -> Option<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .ok()
                .map(|v| if v > 1.0 { v / 100.0 } else { v })
        })
        .collect::<Option<Vec<f64>>>()
        .filter(|v| !v.is_empty())
}

/// Builder for pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Start from the field-trial preset
    pub fn field_trial() -> Self {
        Self {
            config: PipelineConfig::field_trial(),
        }
    }

    /// Set the logger cadence
    pub fn sample_interval_minutes(mut self, minutes: u32) -> Self {
        self.config.sample_interval_minutes = minutes;
        self
    }

    /// Set the minimum samples per day
    pub fn min_samples_per_day(mut self, count: usize) -> Self {
        self.config.min_samples_per_day = count;
        self
    }

    /// Set the abnormal-low threshold for the cosinor path
    pub fn abnormal_low_threshold(mut self, celsius: f64) -> Self {
        self.config.correction.abnormal_low_threshold = celsius;
        self
    }

    /// Set the inclusion floor for the event path
    pub fn detection_floor(mut self, celsius: f64) -> Self {
        self.config.detection.detection_floor = celsius;
        self
    }

    /// Set the correction drop threshold
    pub fn drop_threshold_correction(mut self, delta: f64) -> Self {
        self.config.correction.drop_threshold = delta;
        self
    }

    /// Set the detection drop threshold
    pub fn drop_threshold_detection(mut self, delta: f64) -> Self {
        self.config.detection.drop_threshold = delta;
        self
    }

    /// Set the reported percentiles
    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.config.cosinor.percentiles = percentiles;
        self
    }

    /// Set the optimizer iteration cap
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.cosinor.max_iterations = iterations;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> PipelineConfig {
        self.config
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    /// Unsupported config format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration value
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
