//! Transformation option parsing
//!
//! The option segment is the first path segment of a request:
//! `/w=800,h=600,fit=crop/images/cat.jpg`. It is parsed into an [`OptionMap`]
//! and then resolved against server defaults into a [`TransformSpec`].

use std::collections::HashMap;

use crate::error::ProxyError;

/// Normalized option name → raw value, built fresh per request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap(HashMap<String, String>);

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Expand short option aliases; unknown keys pass through unchanged
fn normalize_option(key: &str) -> &str {
    match key {
        "w" => "width",
        "h" => "height",
        other => other,
    }
}

/// Parse a comma-separated `key=value` option segment
///
/// Values may themselves contain `=`; only the first one splits. Empty pairs
/// (an empty segment or a trailing comma) are skipped. A non-empty pair
/// without `=` fails the whole request.
pub fn parse_options(segment: &str) -> Result<OptionMap, ProxyError> {
    let mut options = OptionMap::new();

    for pair in segment.split(',') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ProxyError::MalformedOptions(format!("expected key=value, got '{}'", pair)))?;
        options.insert(normalize_option(key), value);
    }

    Ok(options)
}

/// Target size along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Fit within this many pixels
    Pixels(u32),
    /// No limit along this axis
    Unconstrained,
}

impl Bound {
    /// Zero means "no limit"
    pub fn from_pixels(pixels: u32) -> Self {
        if pixels == 0 {
            Bound::Unconstrained
        } else {
            Bound::Pixels(pixels)
        }
    }

    pub fn pixels(&self) -> Option<u32> {
        match self {
            Bound::Pixels(n) => Some(*n),
            Bound::Unconstrained => None,
        }
    }
}

/// How to reconcile the source aspect ratio with the target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scale to fit within the box, preserving aspect ratio (contain)
    #[default]
    None,
    /// Scale to cover the box, then crop around the centre
    CropCentered,
}

impl FitMode {
    /// Only `crop` is recognized; anything else keeps the default
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            Some("crop") => FitMode::CropCentered,
            _ => FitMode::None,
        }
    }
}

/// Server-wide dimension defaults, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeDefaults {
    pub max_width: u32,
    pub max_height: u32,
}

/// Concrete resize instructions for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSpec {
    pub width: Bound,
    pub height: Bound,
    pub fit: FitMode,
    /// Never set by request options: the resize policy is downscale-only
    pub allow_upscale: bool,
}

/// Resolve one dimension option against its default
///
/// `auto`, empty, absent, and non-numeric values all fall back to the
/// default rather than failing the request.
fn resolve_dimension(value: Option<&str>, default: u32) -> Bound {
    match value {
        None | Some("") | Some("auto") => Bound::from_pixels(default),
        Some(raw) => match raw.parse::<u32>() {
            Ok(pixels) => Bound::from_pixels(pixels),
            Err(_) => {
                tracing::debug!(value = %raw, default = default, "Ignoring non-numeric dimension");
                Bound::from_pixels(default)
            }
        },
    }
}

/// Build the resize specification for a request. Never fails.
pub fn build_transform_spec(options: &OptionMap, defaults: &ResizeDefaults) -> TransformSpec {
    TransformSpec {
        width: resolve_dimension(options.get("width"), defaults.max_width),
        height: resolve_dimension(options.get("height"), defaults.max_height),
        fit: FitMode::from_option(options.get("fit")),
        allow_upscale: false,
    }
}
