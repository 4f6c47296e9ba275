//! Logging configuration.
//!
//! The client itself only emits `tracing` events; this module is a
//! convenience for binaries that want a ready-made subscriber.

use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{StreamError, StreamResult};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The minimum log level to capture
    pub level: LogLevel,
    /// The output format for log messages
    pub format: LogFormat,
    /// Whether to include the module target in log output
    pub include_target: bool,
    /// Whether to include file and line number in log output
    pub include_file_line: bool,
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level logging (most verbose)
    Trace,
    /// Debug-level logging
    Debug,
    /// Info-level logging
    Info,
    /// Warning-level logging
    Warn,
    /// Error-level logging (least verbose)
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        Level::from(level).into()
    }
}

impl FromStr for LogLevel {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(StreamError::configuration(format!(
                "Unknown log level: {other}"
            ))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (for development)
    Pretty,
    /// JSON format (for structured logging in production)
    Json,
    /// Compact format
    Compact,
}

impl FromStr for LogFormat {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(StreamError::configuration(format!(
                "Unknown log format: {other}"
            ))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_target: true,
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `STREAM_LOG_LEVEL` and `STREAM_LOG_FORMAT`, falling back to the
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either variable holds an unknown value.
    pub fn from_env() -> StreamResult<Self> {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("STREAM_LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var("STREAM_LOG_FORMAT") {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Sets the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the log format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to include the module target.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets whether to include file and line number.
    pub fn with_file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Installs a global subscriber with this configuration.
    ///
    /// `RUST_LOG` directives are honored on top of the configured level.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber has already been installed.
    pub fn init(self) -> StreamResult<()> {
        let filter = self.env_filter();

        let installed = match self.format {
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(self.include_target))
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init(),
        };

        installed.map_err(|e| StreamError::configuration(format!("Logging already initialized: {e}")))
    }

    /// Builds the filter used by [`init`](Self::init): `RUST_LOG` plus the
    /// configured level.
    pub fn env_filter(&self) -> EnvFilter {
        self.with_level_directive(EnvFilter::from_default_env())
    }

    fn with_level_directive(&self, filter: EnvFilter) -> EnvFilter {
        filter.add_directive(LevelFilter::from(self.level).into())
    }
}
