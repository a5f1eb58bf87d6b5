//! Image cleanup ahead of OCR.
//!
//! Tesseract does best on dark text over a clean white background at a
//! reasonable resolution. Each step below is a tuning hook exposed through
//! [`PreprocessOptions`]:
//!
//! 1. flatten alpha onto white (transparent PNGs otherwise turn black)
//! 2. grayscale
//! 3. upscale narrow scans, never past `max_edge` on the longer side
//! 4. Otsu binarisation

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use tracing::debug;

/// Intensity spread below which an image is treated as blank.
const MIN_CONTRAST_SPREAD: u8 = 16;

/// Preprocessing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Threshold to pure black/white at Otsu's level. Default: true.
    pub binarize: bool,
    /// Upscale images narrower than this many pixels; `0` disables. Default: 1000.
    pub min_width: u32,
    /// Upscaling stops once the longer edge reaches this many pixels. Default: 3000.
    pub max_edge: u32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            binarize: true,
            min_width: 1000,
            max_edge: 3000,
        }
    }
}

/// Normalise a page image for OCR.
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> GrayImage {
    let flat = if image.color().has_alpha() {
        DynamicImage::ImageRgb8(flatten_alpha(image))
    } else {
        image.clone()
    };
    let mut gray = flat.to_luma8();

    if let Some((width, height)) = upscaled_size(gray.width(), gray.height(), options) {
        gray = imageops::resize(&gray, width, height, FilterType::CatmullRom);
        debug!("Upscaled page to {}x{}", width, height);
    }

    if options.binarize {
        binarize(&mut gray);
    }
    gray
}

/// Target size for a narrow image, or `None` when it should stay as is.
fn upscaled_size(width: u32, height: u32, options: &PreprocessOptions) -> Option<(u32, u32)> {
    if options.min_width == 0 || width == 0 || height == 0 || width >= options.min_width {
        return None;
    }
    let longest = width.max(height) as f32;
    let factor = (options.min_width as f32 / width as f32).min(options.max_edge as f32 / longest);
    if factor <= 1.0 {
        return None;
    }
    let scale = |v: u32| ((v as f32) * factor).round().max(1.0) as u32;
    Some((scale(width), scale(height)))
}

/// Composite an image with alpha over a white background.
fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Threshold in place at Otsu's level; near-uniform images are left alone.
fn binarize(gray: &mut GrayImage) {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if max.saturating_sub(min) < MIN_CONTRAST_SPREAD {
        debug!("Skipping binarisation: near-uniform image ({min}..={max})");
        return;
    }

    let level = otsu_level(gray);
    for p in gray.pixels_mut() {
        p.0[0] = if p.0[0] > level { 255 } else { 0 };
    }
}
