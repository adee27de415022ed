//! Intensity-image primitives used by the preprocessing pipeline
//!
//! Thin wrappers over `imageproc` that pin the parameters the workbench uses.
//! Kernel sizes are expected to be odd and >= 1; the pipeline normalises them
//! before calling in. Windows wider than the image are shrunk to the widest
//! window that can still reach a pixel, which keeps the work bounded by the
//! image size whatever size was requested.

use image::GrayImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{self, separable_filter_equal};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Constant subtracted from the local mean in adaptive thresholding
pub const ADAPTIVE_C: f32 = 11.0;

/// Colour and spatial sigma for the bilateral filter
pub const BILATERAL_SIGMA: f32 = 75.0;

/// Largest radius `Mask::square` accepts
const MAX_MASK_RADIUS: u32 = u8::MAX as u32;

/// Widest odd window that still overlaps another pixel of `gray`
fn window_limit(gray: &GrayImage) -> u32 {
    gray.width()
        .max(gray.height())
        .saturating_mul(2)
        .saturating_add(1)
}

/// Binary threshold: pixels strictly above `level` become 255, the rest 0
pub fn threshold_binary(gray: &GrayImage, level: u8) -> GrayImage {
    threshold(gray, level, ThresholdType::Binary)
}

/// Otsu threshold. Returns the chosen level together with the binarised image.
pub fn threshold_otsu(gray: &GrayImage) -> (u8, GrayImage) {
    let level = otsu_level(gray);
    (level, threshold_binary(gray, level))
}

/// Gaussian-weighted adaptive threshold.
///
/// A pixel becomes 255 when it is brighter than the Gaussian-weighted mean of
/// its `block_size` neighbourhood minus [`ADAPTIVE_C`].
pub fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32) -> GrayImage {
    let local = gaussian_blur(gray, block_size);
    let mut out = GrayImage::new(gray.width(), gray.height());

    for ((dst, &src), &mean) in out
        .as_mut()
        .iter_mut()
        .zip(gray.as_raw().iter())
        .zip(local.as_raw().iter())
    {
        *dst = if src as f32 > mean as f32 - ADAPTIVE_C { 255 } else { 0 };
    }

    out
}

/// Sigma used for a Gaussian kernel of the given size when none is specified
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalised 1-D Gaussian kernel of odd length `len`
pub fn gaussian_kernel_1d(len: u32, sigma: f32) -> Vec<f32> {
    let len = len.max(1) as usize;
    let center = (len / 2) as f32;
    let two_sigma2 = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - center;
            (-(x * x) / two_sigma2).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    if sum > 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }

    kernel
}

/// Gaussian blur with a square `kernel_size` x `kernel_size` window.
///
/// Borders replicate the edge pixel. Sigma always follows the requested size,
/// even when the kernel itself is shortened to fit the image.
pub fn gaussian_blur(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return gray.clone();
    }
    let len = kernel_size.min(window_limit(gray));
    let kernel = gaussian_kernel_1d(len, sigma_for_kernel(kernel_size));
    separable_filter_equal(gray, &kernel)
}

/// Edge-preserving bilateral smoothing over a `diameter`-wide window
pub fn bilateral_filter(gray: &GrayImage, diameter: u32) -> GrayImage {
    if diameter <= 1 || gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let window = diameter.min(window_limit(gray));
    filter::bilateral_filter(gray, window, BILATERAL_SIGMA, BILATERAL_SIGMA)
}

/// Square masks whose successive application equals one `kernel_size` square.
///
/// Out-of-image pixels never take part in `imageproc`'s morphology, so on a
/// rectangle a radius `a + b` square is a radius `a` pass followed by a
/// radius `b` pass.
fn square_passes(gray: &GrayImage, kernel_size: u32) -> Vec<Mask> {
    let mut radius = (kernel_size / 2).min(gray.width().max(gray.height()));
    let mut passes = Vec::new();
    while radius > 0 {
        let step = radius.min(MAX_MASK_RADIUS);
        passes.push(Mask::square(step as u8));
        radius -= step;
    }
    passes
}

/// Grayscale dilation with a `kernel_size` square structuring element
pub fn dilate(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    square_passes(gray, kernel_size)
        .iter()
        .fold(gray.clone(), |img, mask| grayscale_dilate(&img, mask))
}

/// Grayscale erosion with a `kernel_size` square structuring element
pub fn erode(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    square_passes(gray, kernel_size)
        .iter()
        .fold(gray.clone(), |img, mask| grayscale_erode(&img, mask))
}

/// Morphological opening: erosion followed by dilation
pub fn open(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    dilate(&erode(gray, kernel_size), kernel_size)
}

/// Morphological closing: dilation followed by erosion
pub fn close(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    erode(&dilate(gray, kernel_size), kernel_size)
}
