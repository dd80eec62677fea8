use serde::{Deserialize, Serialize};

use super::encoder::EncoderQuality;
use super::params::ResizeDefaults;
use super::processor::SourceLimits;
use crate::constants::{
    DEFAULT_ENGINE_THREADS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_SOURCE_HEIGHT,
    DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_MAX_SOURCE_WIDTH, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageConfig {
    /// Width used when a request does not ask for one (0 = unconstrained)
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Height used when a request does not ask for one (0 = unconstrained)
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Quality for lossy formats (JPEG, WebP)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Worker threads of the transform engine
    #[serde(default = "default_engine_threads")]
    pub engine_threads: usize,

    /// Largest source width accepted for decoding
    #[serde(default = "default_max_source_width")]
    pub max_source_width: u32,

    /// Largest source height accepted for decoding
    #[serde(default = "default_max_source_height")]
    pub max_source_height: u32,

    /// Largest source pixel count (width * height) accepted for decoding
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            engine_threads: DEFAULT_ENGINE_THREADS,
            max_source_width: DEFAULT_MAX_SOURCE_WIDTH,
            max_source_height: DEFAULT_MAX_SOURCE_HEIGHT,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }
}

impl ImageConfig {
    pub fn resize_defaults(&self) -> ResizeDefaults {
        ResizeDefaults {
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }

    pub fn encoder_quality(&self) -> EncoderQuality {
        EncoderQuality::with_quality(self.quality)
    }

    pub fn source_limits(&self) -> SourceLimits {
        SourceLimits {
            max_width: self.max_source_width,
            max_height: self.max_source_height,
            max_pixels: self.max_source_pixels,
        }
    }
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_engine_threads() -> usize {
    DEFAULT_ENGINE_THREADS
}

fn default_max_source_width() -> u32 {
    DEFAULT_MAX_SOURCE_WIDTH
}

fn default_max_source_height() -> u32 {
    DEFAULT_MAX_SOURCE_HEIGHT
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}
