//! Display fitting for the image panels
//!
//! Only affects what is pushed to the screen; pipeline results are never
//! resized.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};

/// Size that fits `(width, height)` inside the bounds, keeping aspect ratio.
/// Images already inside the bounds keep their size.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_w = ((width as f64 * scale).round() as u32).max(1);
    let new_h = ((height as f64 * scale).round() as u32).max(1);
    (new_w, new_h)
}

/// Downscale an image for display if it exceeds the bounds
pub fn fit_for_display(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = fit_within(width, height, max_width, max_height);
    if (new_w, new_h) == (width, height) {
        return image.clone();
    }
    DynamicImage::from(imageops::resize(image, new_w, new_h, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_images_are_not_upscaled() {
        assert_eq!(fit_within(640, 480, 1000, 800), (640, 480));
    }

    #[test]
    fn test_wide_image_is_limited_by_width() {
        assert_eq!(fit_within(2000, 500, 1000, 800), (1000, 250));
    }

    #[test]
    fn test_tall_image_is_limited_by_height() {
        assert_eq!(fit_within(400, 1600, 1000, 800), (200, 800));
    }

    #[test]
    fn test_fit_for_display_resizes() {
        let img = DynamicImage::new_luma8(3000, 1000);
        let fitted = fit_for_display(&img, 1000, 800);
        assert_eq!(fitted.dimensions(), (1000, 333));
    }
}
