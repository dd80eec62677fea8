//! Image encoding
//!
//! A single `encode` entry point dispatches on [`OutputFormat`]. Output is
//! always produced from raw pixels, so EXIF, ICC and other metadata from the
//! source never reach the client.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder as _};

use super::error::ImageError;
use super::format::OutputFormat;

/// Quality settings for lossy encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality)
    pub quality: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

impl EncoderQuality {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

/// Encode an image to the given format
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: EncoderQuality,
) -> Result<Vec<u8>, ImageError> {
    let (width, height) = (image.width(), image.height());

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = image.to_rgb8();
            let mut output = Cursor::new(Vec::new());
            JpegEncoder::new_with_quality(&mut output, quality.quality)
                .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;
            Ok(output.into_inner())
        }
        OutputFormat::Png => {
            let rgba = image.to_rgba8();
            let mut output = Cursor::new(Vec::new());
            PngEncoder::new(&mut output)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;
            Ok(output.into_inner())
        }
        OutputFormat::WebP => {
            let rgba = image.to_rgba8();
            // `encode` unwraps internally; libwebp rejects sides over 16383 px
            let encoded = webp::Encoder::from_rgba(rgba.as_raw(), width, height)
                .encode_simple(false, quality.quality as f32)
                .map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;
            if encoded.is_empty() {
                return Err(ImageError::encode_failed("webp", "encoder produced no output"));
            }
            Ok(encoded.to_vec())
        }
    }
}
