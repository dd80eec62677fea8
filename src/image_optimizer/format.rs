//! Output format negotiation
//!
//! The response format is picked from the client's `Accept` header and the
//! source image format:
//! - WebP whenever the client advertises `image/webp` (with `Vary: Accept`)
//! - PNG for PNG sources, to keep transparency
//! - JPEG otherwise

use image::ImageFormat;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    WebP,
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Result of negotiation: the chosen format and whether the choice depended
/// on the request's `Accept` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub format: OutputFormat,
    pub vary_accept: bool,
}

/// Choose the output format for a response
///
/// # Arguments
/// * `accept_header` - The Accept header value, if any
/// * `source_format` - The sniffed source format, if recognizable
pub fn negotiate(accept_header: Option<&str>, source_format: Option<ImageFormat>) -> Negotiated {
    if accept_header.is_some_and(|accept| accept.contains("image/webp")) {
        return Negotiated {
            format: OutputFormat::WebP,
            vary_accept: true,
        };
    }

    let format = match source_format {
        Some(ImageFormat::Png) => OutputFormat::Png,
        _ => OutputFormat::Jpeg,
    };

    Negotiated {
        format,
        vary_accept: false,
    }
}

/// Get the Vary header value for negotiated responses
pub fn vary_header() -> &'static str {
    "Accept"
}
