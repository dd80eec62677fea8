//! Image processing implementation
//!
//! Handles the actual image transformation: decode → resize → crop → encode

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;
use std::num::NonZeroU32;

use super::encoder::{encode, EncoderQuality};
use super::error::ImageError;
use super::format::{negotiate, OutputFormat};
use super::params::{FitMode, TransformSpec};
use crate::constants::{
    DEFAULT_MAX_SOURCE_HEIGHT, DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_MAX_SOURCE_WIDTH,
};

/// Upper bounds on source dimensions, checked from the header before decoding
///
/// A few kilobytes of compressed PNG can describe a gigapixel canvas; without
/// this check every fetch slot could allocate the full decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_pixels: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_SOURCE_WIDTH,
            max_height: DEFAULT_MAX_SOURCE_HEIGHT,
            max_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }
}

impl SourceLimits {
    pub fn check(&self, width: u32, height: u32) -> Result<(), ImageError> {
        let pixels = width as u64 * height as u64;
        if width > self.max_width || height > self.max_height || pixels > self.max_pixels {
            return Err(ImageError::DimensionsExceeded {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
                max_pixels: self.max_pixels,
            });
        }
        Ok(())
    }
}

/// Result of image processing
#[derive(Debug)]
pub struct ProcessedImage {
    /// The encoded image data
    pub data: Vec<u8>,
    /// Negotiated output format
    pub format: OutputFormat,
    /// Whether the format choice depended on the Accept header
    pub vary_accept: bool,
    /// Original dimensions (width, height)
    pub original_size: (u32, u32),
    /// Output dimensions (width, height)
    pub output_size: (u32, u32),
}

/// Geometry of a transformation, computed before touching pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Size after scaling (width, height)
    pub scaled: (u32, u32),
    /// Centre crop applied after scaling: (x, y, width, height)
    pub crop: Option<(u32, u32, u32, u32)>,
}

impl ResizePlan {
    pub fn output_size(&self) -> (u32, u32) {
        match self.crop {
            Some((_, _, w, h)) => (w, h),
            None => self.scaled,
        }
    }
}

/// Compute the resize plan for a source of `src_width` x `src_height`
///
/// `FitMode::None` scales to fit inside the box, `FitMode::CropCentered`
/// scales to cover it and crops the overflow around the centre. Unconstrained
/// axes do not participate. Without `allow_upscale` the scale never exceeds 1.
pub fn plan_resize(src_width: u32, src_height: u32, spec: &TransformSpec) -> ResizePlan {
    let ratio = |target: Option<u32>, src: u32| target.map(|t| t as f64 / src.max(1) as f64);
    let target_w = spec.width.pixels();
    let target_h = spec.height.pixels();

    let scale = match (ratio(target_w, src_width), ratio(target_h, src_height)) {
        (None, None) => 1.0,
        (Some(s), None) | (None, Some(s)) => s,
        (Some(sx), Some(sy)) => match spec.fit {
            FitMode::None => sx.min(sy),
            FitMode::CropCentered => sx.max(sy),
        },
    };
    let scale = if spec.allow_upscale {
        scale
    } else {
        scale.min(1.0)
    };

    let scaled_w = ((src_width as f64 * scale).round() as u32).max(1);
    let scaled_h = ((src_height as f64 * scale).round() as u32).max(1);

    let crop = match spec.fit {
        FitMode::None => None,
        FitMode::CropCentered => {
            let crop_w = target_w.map_or(scaled_w, |t| t.min(scaled_w));
            let crop_h = target_h.map_or(scaled_h, |t| t.min(scaled_h));
            if crop_w < scaled_w || crop_h < scaled_h {
                Some((
                    (scaled_w - crop_w) / 2,
                    (scaled_h - crop_h) / 2,
                    crop_w,
                    crop_h,
                ))
            } else {
                None
            }
        }
    };

    ResizePlan {
        scaled: (scaled_w, scaled_h),
        crop,
    }
}

/// Decode, resize per spec, negotiate the output format and encode
///
/// # Arguments
/// * `data` - Raw source image bytes
/// * `spec` - Resize specification
/// * `accept` - The request's Accept header, if any
/// * `quality` - Quality for lossy encoders
/// * `limits` - Source dimension limits, enforced before decoding
pub fn process_image(
    data: &[u8],
    spec: &TransformSpec,
    accept: Option<&str>,
    quality: EncoderQuality,
    limits: &SourceLimits,
) -> Result<ProcessedImage, ImageError> {
    let source_format = image::guess_format(data).ok();
    let img = decode_image(data, limits)?;
    let original_size = (img.width(), img.height());

    let plan = plan_resize(original_size.0, original_size.1, spec);

    let mut processed = if plan.scaled != original_size {
        resize_image(&img, plan.scaled.0, plan.scaled.1)?
    } else {
        img
    };
    if let Some((x, y, w, h)) = plan.crop {
        processed = processed.crop_imm(x, y, w, h);
    }

    let negotiated = negotiate(accept, source_format);
    let data = encode(&processed, negotiated.format, quality)?;

    Ok(ProcessedImage {
        data,
        format: negotiated.format,
        vary_accept: negotiated.vary_accept,
        original_size,
        output_size: (processed.width(), processed.height()),
    })
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Decode image data into a DynamicImage once its header passes `limits`
fn decode_image(data: &[u8], limits: &SourceLimits) -> Result<DynamicImage, ImageError> {
    let (width, height) = reader(data)?
        .into_dimensions()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?;
    limits.check(width, height)?;

    reader(data)?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(
    img: &DynamicImage,
    target_w: u32,
    target_h: u32,
) -> Result<DynamicImage, ImageError> {
    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
