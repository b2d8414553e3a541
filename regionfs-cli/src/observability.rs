//! Tracing subscriber setup with format selection.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging.
    Json,
    /// Human-readable pretty format with colors.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::default(),
        })
    }
}

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "warn".to_string(),
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REGIONFS_LOG_FORMAT`: "json", "pretty", or "compact"
    /// - `REGIONFS_LOG` or `RUST_LOG`: log filter string
    /// - `REGIONFS_LOG_LOCATION`: "true" to include file and line
    ///
    /// `default_filter` applies when neither filter variable is set.
    pub fn from_env(default_filter: &str) -> Self {
        let log_format = env::var("REGIONFS_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_default();

        let log_filter = env::var("REGIONFS_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| default_filter.to_string());

        Self {
            log_format,
            log_filter,
            include_location: env::var("REGIONFS_LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Set the log format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the log filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the log filter.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let location = config.include_location;

    match config.log_format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")
}
