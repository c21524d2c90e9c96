//! Pixel operations used by the built-in transforms.
//!
//! These combine the pure [`calculations`](super::calculations) with the
//! `image` crate's resamplers (Lanczos3 throughout).

use super::calculations::{crop_box_on_centerpoint, fits_within};
use super::params::Palette;
use crate::ppoi::Ppoi;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Crop `image` to exactly `width`x`height`, framing around the PPOI.
///
/// The largest region with the target aspect ratio is cut out first, then
/// resized down (or up) to the exact box. Degenerate sources (a zero
/// dimension) produce a blank canvas of the requested size.
pub fn crop_on_centerpoint(
    image: &DynamicImage,
    width: u32,
    height: u32,
    ppoi: Ppoi,
) -> DynamicImage {
    match crop_box_on_centerpoint(image.dimensions(), (width, height), ppoi) {
        Some(b) => image
            .crop_imm(b.left, b.top, b.width, b.height)
            .resize_exact(width, height, FilterType::Lanczos3),
        None => blank_like(image, width, height),
    }
}

/// Scale `image` down to fit inside `width`x`height`, preserving its aspect
/// ratio. Never upscales and never crops.
pub fn thumbnail(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return blank_like(&image, width, height);
    }
    if fits_within((w, h), (width, height)) {
        image
    } else {
        image.resize(width, height, FilterType::Lanczos3)
    }
}

/// Invert colours. Alpha is dropped: the result is always 8-bit RGB.
pub fn invert(image: &DynamicImage) -> DynamicImage {
    let mut rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    rgb.invert();
    rgb
}

/// Snap every pixel onto the nearest entry of `palette`.
///
/// Resampling an indexed image introduces colours that were never in its
/// table; re-encoding would then quantize them unpredictably.
pub fn apply_palette(image: &DynamicImage, palette: &Palette) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        *pixel = palette.nearest(*pixel);
    }
    DynamicImage::ImageRgba8(rgba)
}

fn blank_like(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    DynamicImage::new(width, height, image.color())
}
