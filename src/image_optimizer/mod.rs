//! Image transformation
//!
//! Turns the option segment of a request path into a resize specification
//! and runs decode → resize → encode on a dedicated engine pool.
//!
//! # Options
//!
//! ```text
//! /w=800,h=600,fit=crop/images/cat.jpg
//! ```
//!
//! - `w` / `width`, `h` / `height`: target box in pixels (`auto` = server default)
//! - `fit=crop`: cover the box and crop around the centre; otherwise the image
//!   is scaled to fit inside the box
//!
//! Images are never enlarged. The output format is negotiated from the
//! `Accept` header and the source format.

pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod format;
pub mod params;
pub mod processor;

pub use config::ImageConfig;
pub use encoder::{encode, EncoderQuality};
pub use engine::TransformEngine;
pub use error::ImageError;
pub use format::{negotiate, vary_header, Negotiated, OutputFormat};
pub use params::{
    build_transform_spec, parse_options, Bound, FitMode, OptionMap, ResizeDefaults, TransformSpec,
};
pub use processor::{plan_resize, process_image, ProcessedImage, ResizePlan, SourceLimits};
