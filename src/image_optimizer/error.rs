//! Image engine error types
//!
//! Structured errors for the decode → resize → encode path, with HTTP
//! status mapping consistent with the rest of the proxy.

use std::fmt;

/// Errors that can occur while transforming an image
#[derive(Debug, Clone)]
pub enum ImageError {
    /// Fetched bytes could not be interpreted as an image
    DecodeFailed { message: String },
    /// Resize or crop operation failed
    ResizeFailed { message: String },
    /// Encoding to the negotiated output format failed
    EncodeFailed { format: String, message: String },
    /// Source dimensions exceed the configured limits (decompression bomb)
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
        max_pixels: u64,
    },
    /// A codec panicked inside an engine job
    JobPanicked { message: String },
    /// The engine has been shut down or its worker pool went away
    EngineUnavailable,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::DimensionsExceeded {
                width,
                height,
                max_width,
                max_height,
                max_pixels,
            } => write!(
                f,
                "Source image {}x{} exceeds limits {}x{} / {} pixels",
                width, height, max_width, max_height, max_pixels
            ),
            ImageError::JobPanicked { message } => {
                write!(f, "Transform job panicked: {}", message)
            }
            ImageError::EngineUnavailable => {
                write!(f, "Transform engine is not running")
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Maps image errors to HTTP status codes
    ///
    /// Every engine failure is reported as 503: the proxy cannot tell a
    /// broken origin object from a transient engine problem.
    pub fn to_http_status(&self) -> u16 {
        503
    }

    /// Short machine-readable kind used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::DecodeFailed { .. } => "decode_error",
            ImageError::ResizeFailed { .. } => "resize_error",
            ImageError::EncodeFailed { .. } => "encode_error",
            ImageError::DimensionsExceeded { .. } => "source_dimensions_exceeded",
            ImageError::JobPanicked { .. } => "engine_panic",
            ImageError::EngineUnavailable => "engine_unavailable",
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}
