//! # RumenKernel Core
//!
//! Core abstractions, traits, and registry for the RumenKernels temperature
//! analysis library.
//!
//! This crate provides:
//! - Domain and kernel metadata definitions
//! - Trait definitions for batch analysis kernels
//! - A kernel catalogue registry
//! - Pipeline configuration (presets, environment, TOML/JSON files)
//! - Logging initialization

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod registry;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ConfigError, CorrectionConfig, CorrectionWindows, CosinorConfig, DetectionConfig,
        DetectionWindows, PipelineConfig, PipelineConfigBuilder, WindowSpan,
    };
    pub use crate::domain::Domain;
    pub use crate::error::{KernelError, Result};
    pub use crate::kernel::KernelMetadata;
    pub use crate::logging::{LogConfig, LogLevel};
    pub use crate::registry::{KernelRegistry, RegistryStats};
    pub use crate::traits::{AnalysisKernel, BatchKernel};
}
