// Error types module

use std::time::Duration;
use thiserror::Error;

use crate::constants::STATUS_CLIENT_CLOSED_REQUEST;
use crate::image_optimizer::ImageError;

/// Centralized error type for the proxy
///
/// Every variant maps to exactly one response status. Pipeline failures all
/// surface as 503 so that clients never see a partially transformed image;
/// client aborts are kept apart (499) so monitoring does not count them as
/// server defects.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Path has fewer than two segments, or the locator cannot be turned into a URL
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// An option pair in the option segment is not `key=value`
    #[error("Malformed options: {0}")]
    MalformedOptions(String),

    /// DNS, connection, or body read failure while fetching the source
    #[error("Fetch failed: {0}")]
    FetchTransport(String),

    /// Source fetch exceeded the configured timeout
    #[error("Fetch timed out after {}s", .0.as_secs())]
    FetchTimeout(Duration),

    /// Source body is larger than the configured limit
    #[error("Source exceeds maximum size of {max} bytes")]
    SourceTooLarge { max: u64 },

    /// Decode, resize, or encode failure
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Client disconnected or the request deadline passed
    #[error("Request cancelled")]
    Cancelled,

    /// Only GET and HEAD are served
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// Fetch slots were closed for shutdown
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Invalid configuration (startup only)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Map to the HTTP status code written to the client
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::Cancelled => STATUS_CLIENT_CLOSED_REQUEST,
            ProxyError::MethodNotAllowed(_) => 405,
            ProxyError::Image(e) => e.to_http_status(),
            ProxyError::MalformedPath(_)
            | ProxyError::MalformedOptions(_)
            | ProxyError::FetchTransport(_)
            | ProxyError::FetchTimeout(_)
            | ProxyError::SourceTooLarge { .. }
            | ProxyError::ShuttingDown
            | ProxyError::Config(_) => 503,
        }
    }

    /// Short machine-readable kind used in logs and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedPath(_) => "malformed_path",
            ProxyError::MalformedOptions(_) => "malformed_options",
            ProxyError::FetchTransport(_) => "fetch_error",
            ProxyError::FetchTimeout(_) => "fetch_timeout",
            ProxyError::SourceTooLarge { .. } => "source_too_large",
            ProxyError::Image(e) => e.kind(),
            ProxyError::Cancelled => "request_cancelled",
            ProxyError::MethodNotAllowed(_) => "method_not_allowed",
            ProxyError::ShuttingDown => "shutting_down",
            ProxyError::Config(_) => "config_error",
        }
    }
}
