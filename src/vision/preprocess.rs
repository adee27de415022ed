//! Preprocessing pipeline selector
//!
//! Maps a named method plus a small parameter set onto a deterministic
//! transform over an intensity image. Parameter normalisation (odd kernel
//! sizes, clamped threshold) happens when a [`PreprocessConfig`] is built, so
//! a config can never carry an even kernel size or an out-of-range level.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::WorkbenchError;
use crate::vision::filters;

/// Preprocessing method applied before recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessMethod {
    /// Intensity conversion only
    #[default]
    #[serde(alias = "basic")]
    Gray,
    /// Fixed binary threshold at the configured level
    Threshold,
    /// Gaussian-weighted adaptive threshold
    AdaptiveThreshold,
    /// Otsu threshold (level chosen from the histogram)
    Otsu,
    /// Gaussian blur
    GaussianBlur,
    /// Edge-preserving bilateral smoothing
    BilateralFilter,
    /// Grayscale dilation
    Dilation,
    /// Grayscale erosion
    Erosion,
    /// Erosion followed by dilation
    Opening,
    /// Dilation followed by erosion
    Closing,
}

impl PreprocessMethod {
    /// All methods in the order they are offered to the user
    pub const ALL: [PreprocessMethod; 10] = [
        PreprocessMethod::Gray,
        PreprocessMethod::Threshold,
        PreprocessMethod::AdaptiveThreshold,
        PreprocessMethod::Otsu,
        PreprocessMethod::GaussianBlur,
        PreprocessMethod::BilateralFilter,
        PreprocessMethod::Dilation,
        PreprocessMethod::Erosion,
        PreprocessMethod::Opening,
        PreprocessMethod::Closing,
    ];

    /// Canonical tag used on the command line and in config files
    pub fn tag(&self) -> &'static str {
        match self {
            PreprocessMethod::Gray => "gray",
            PreprocessMethod::Threshold => "threshold",
            PreprocessMethod::AdaptiveThreshold => "adaptive_threshold",
            PreprocessMethod::Otsu => "otsu",
            PreprocessMethod::GaussianBlur => "gaussian_blur",
            PreprocessMethod::BilateralFilter => "bilateral_filter",
            PreprocessMethod::Dilation => "dilation",
            PreprocessMethod::Erosion => "erosion",
            PreprocessMethod::Opening => "opening",
            PreprocessMethod::Closing => "closing",
        }
    }

    /// Display name for the dashboard
    pub fn name(&self) -> &'static str {
        match self {
            PreprocessMethod::Gray => "Grayscale",
            PreprocessMethod::Threshold => "Threshold",
            PreprocessMethod::AdaptiveThreshold => "Adaptive threshold",
            PreprocessMethod::Otsu => "Otsu",
            PreprocessMethod::GaussianBlur => "Gaussian blur",
            PreprocessMethod::BilateralFilter => "Bilateral filter",
            PreprocessMethod::Dilation => "Dilation",
            PreprocessMethod::Erosion => "Erosion",
            PreprocessMethod::Opening => "Opening",
            PreprocessMethod::Closing => "Closing",
        }
    }

    /// Whether the threshold level influences this method
    pub fn uses_threshold(&self) -> bool {
        matches!(self, PreprocessMethod::Threshold)
    }

    /// Whether the blur size influences this method
    pub fn uses_blur_size(&self) -> bool {
        matches!(
            self,
            PreprocessMethod::AdaptiveThreshold
                | PreprocessMethod::GaussianBlur
                | PreprocessMethod::BilateralFilter
        )
    }

    /// Whether the morphology size influences this method
    pub fn uses_morph_size(&self) -> bool {
        matches!(
            self,
            PreprocessMethod::Dilation
                | PreprocessMethod::Erosion
                | PreprocessMethod::Opening
                | PreprocessMethod::Closing
        )
    }
}

impl fmt::Display for PreprocessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PreprocessMethod {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        match tag.as_str() {
            "basic" => Ok(PreprocessMethod::Gray),
            other => PreprocessMethod::ALL
                .into_iter()
                .find(|m| m.tag() == other)
                .ok_or_else(|| WorkbenchError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Default threshold level
pub const DEFAULT_THRESHOLD: u8 = 127;
/// Default blur kernel size
pub const DEFAULT_BLUR_SIZE: u32 = 5;
/// Default morphology kernel size
pub const DEFAULT_MORPH_SIZE: u32 = 3;

/// Smallest block size the adaptive threshold accepts; a 1x1 block would
/// compare every pixel against itself.
const MIN_ADAPTIVE_BLOCK: u32 = 3;

/// Clamp a user-supplied threshold into `0..=255`
pub fn clamp_threshold(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// Coerce a user-supplied kernel size to an odd value >= 1.
/// Even values are bumped up by one; values below 1 become 1.
pub fn odd_kernel_size(value: i64) -> u32 {
    if value < 1 {
        return 1;
    }
    let value = value.min(u32::MAX as i64 - 1) as u32;
    if value % 2 == 0 {
        value + 1
    } else {
        value
    }
}

/// Normalised preprocessing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    method: PreprocessMethod,
    threshold: u8,
    blur_size: u32,
    morph_size: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            method: PreprocessMethod::default(),
            threshold: DEFAULT_THRESHOLD,
            blur_size: DEFAULT_BLUR_SIZE,
            morph_size: DEFAULT_MORPH_SIZE,
        }
    }
}

impl PreprocessConfig {
    /// Build a config from raw values, normalising every parameter
    pub fn new(method: PreprocessMethod, threshold: i64, blur_size: i64, morph_size: i64) -> Self {
        Self {
            method,
            threshold: clamp_threshold(threshold),
            blur_size: odd_kernel_size(blur_size),
            morph_size: odd_kernel_size(morph_size),
        }
    }

    pub fn method(&self) -> PreprocessMethod {
        self.method
    }

    /// Threshold level, always within `0..=255`
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Blur kernel size, always odd
    pub fn blur_size(&self) -> u32 {
        self.blur_size
    }

    /// Morphology kernel size, always odd
    pub fn morph_size(&self) -> u32 {
        self.morph_size
    }

    /// Apply a partial update, normalising the fields it touches
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            method: update.method.unwrap_or(self.method),
            threshold: update.threshold.map(clamp_threshold).unwrap_or(self.threshold),
            blur_size: update.blur_size.map(odd_kernel_size).unwrap_or(self.blur_size),
            morph_size: update.morph_size.map(odd_kernel_size).unwrap_or(self.morph_size),
        }
    }
}

/// Partial change to a [`PreprocessConfig`]; `None` fields are left as is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub method: Option<PreprocessMethod>,
    pub threshold: Option<i64>,
    pub blur_size: Option<i64>,
    pub morph_size: Option<i64>,
}

impl ConfigUpdate {
    pub fn method(method: PreprocessMethod) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    pub fn threshold(value: i64) -> Self {
        Self {
            threshold: Some(value),
            ..Default::default()
        }
    }

    pub fn blur_size(value: i64) -> Self {
        Self {
            blur_size: Some(value),
            ..Default::default()
        }
    }

    pub fn morph_size(value: i64) -> Self {
        Self {
            morph_size: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.method.is_none()
            && self.threshold.is_none()
            && self.blur_size.is_none()
            && self.morph_size.is_none()
    }
}

/// Convert any supported image to single-channel intensity
pub fn to_intensity(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

/// Apply the configured method to `image`.
///
/// Pure: the same image and config always produce the same bytes. The input
/// is converted to intensity first; the result is always single-channel.
pub fn apply(image: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = to_intensity(image);
    apply_to_intensity(&gray, config)
}

/// Same as [`apply`] for an image that is already single-channel
pub fn apply_to_intensity(gray: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let blur = config.blur_size();
    let morph = config.morph_size();

    match config.method() {
        PreprocessMethod::Gray => gray.clone(),
        PreprocessMethod::Threshold => filters::threshold_binary(gray, config.threshold()),
        PreprocessMethod::AdaptiveThreshold => {
            filters::adaptive_threshold_gaussian(gray, blur.max(MIN_ADAPTIVE_BLOCK))
        }
        PreprocessMethod::Otsu => {
            let (level, out) = filters::threshold_otsu(gray);
            debug!("Otsu level selected: {}", level);
            out
        }
        PreprocessMethod::GaussianBlur => filters::gaussian_blur(gray, blur),
        PreprocessMethod::BilateralFilter => filters::bilateral_filter(gray, blur),
        PreprocessMethod::Dilation => filters::dilate(gray, morph),
        PreprocessMethod::Erosion => filters::erode(gray, morph),
        PreprocessMethod::Opening => filters::open(gray, morph),
        PreprocessMethod::Closing => filters::close(gray, morph),
    }
}
