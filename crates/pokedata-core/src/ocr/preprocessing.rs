//! Image preprocessing for card crops.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba, RgbaImage};
use tracing::debug;

use super::NormBox;

/// Crops shorter than this are upscaled before recognition.
const MIN_CROP_HEIGHT: u32 = 64;

/// Crop a region given in normalized coordinates.
///
/// Returns `None` when the region collapses to zero pixels.
pub fn crop_normalized(image: &DynamicImage, region: &NormBox) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let (x, y, w, h) = region.to_pixels(width, height)?;
    Some(image.crop_imm(x, y, w, h))
}

/// Grayscale, stretch contrast, upscale small crops, and sharpen.
pub fn enhance_for_ocr(image: &DynamicImage) -> DynamicImage {
    let gray = autocontrast(&image.to_luma8());
    let mut enhanced = DynamicImage::ImageLuma8(gray);

    let (width, height) = enhanced.dimensions();
    if height > 0 && height < MIN_CROP_HEIGHT {
        let scale = MIN_CROP_HEIGHT.div_ceil(height);
        debug!("Upscaling {}x{} crop by {}", width, height, scale);
        enhanced = enhanced.resize_exact(
            width * scale,
            height * scale,
            image::imageops::FilterType::Lanczos3,
        );
    }

    enhanced.unsharpen(1.5, 3)
}

/// Surround the image with a white border.
pub fn pad_white(image: &DynamicImage, border: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let mut canvas = RgbaImage::from_pixel(
        width + border * 2,
        height + border * 2,
        Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut canvas, &image.to_rgba8(), border as i64, border as i64);
    DynamicImage::ImageRgba8(canvas)
}

/// Linearly stretch luminance so the darkest pixel maps to 0 and the brightest to 255.
fn autocontrast(image: &GrayImage) -> GrayImage {
    let (lo, hi) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi <= lo {
        return image.clone();
    }

    let range = (hi - lo) as f32;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0];
        Luma([(((v - lo) as f32 / range) * 255.0).round() as u8])
    })
}
