//! Structured Logging
//!
//! Thin configuration layer over `tracing-subscriber` for the pipeline
//! binaries and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use rumenkernel_core::logging::LogConfig;
//!
//! LogConfig::production().init()?;
//! tracing::info!(animal_id = "S0012", "processing started");
//! ```

use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Map a repeated `-v` count onto a level, starting from `Info`.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level
    pub level: LogLevel,
    /// Enable structured JSON output
    pub structured: bool,
    /// Include caller location
    pub include_location: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Write to stderr instead of stdout
    pub to_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            structured: false,
            include_location: false,
            include_thread_ids: false,
            to_stderr: true,
        }
    }
}

impl LogConfig {
    /// Development configuration
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Default::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            structured: true,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    /// Set the level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Toggle JSON output
    pub fn with_structured(mut self, structured: bool) -> Self {
        self.structured = structured;
        self
    }

    /// Initialize logging
    ///
    /// `RUST_LOG` takes precedence over the configured level. Calling this more
    /// than once is harmless; later calls leave the first subscriber in place.
    pub fn init(&self) -> crate::error::Result<()> {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let subscriber = tracing_subscriber::registry().with(filter);

        match (self.structured, self.to_stderr) {
            (true, true) => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (true, false) => {
                let layer = fmt::layer()
                    .json()
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (false, true) => {
                let layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (false, false) => {
                let layer = fmt::layer()
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
        }

        Ok(())
    }
}
