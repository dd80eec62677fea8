// Logging module for structured logging using the tracing crate

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g. "info", "shukusho=debug")
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Build the level filter: `RUST_LOG` wins, then the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
        directive: config.level.clone(),
        message: e.to_string(),
    })
}

/// Initialize the global tracing subscriber
///
/// Call once at startup, before anything logs. Logs go to stdout.
///
/// # Errors
///
/// Fails if the level directive does not parse or a global subscriber is
/// already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
