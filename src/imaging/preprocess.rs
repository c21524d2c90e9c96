//! Format-aware preprocessing applied before any transform runs.
//!
//! Two steps, always in this order:
//!
//! 1. **Orientation**: EXIF orientations 3, 6 and 8 (180°, 90° clockwise,
//!    90° counter-clockwise) are rotated away so every transform sees the
//!    image the way a viewer would. Mirrored orientations are left alone.
//! 2. **Format hook**: a per-format function looked up in a table keyed by
//!    [`ImageFormatTag`]. Hooks may convert the pixel layout and contribute
//!    encode parameters (JPEG quality, GIF transparency and palette).

use super::format::ImageFormatTag;
use super::params::{Palette, Quality, SaveParams};
use image::metadata::Orientation;
use image::{DynamicImage, Rgba};
use std::collections::HashSet;

/// Defaults the format hooks draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeDefaults {
    pub jpeg_quality: Quality,
}

impl Default for EncodeDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::default(),
        }
    }
}

type FormatHook = fn(DynamicImage, &EncodeDefaults, &mut SaveParams) -> DynamicImage;

const FORMAT_HOOKS: &[(ImageFormatTag, FormatHook)] = &[
    (ImageFormatTag::Jpeg, preprocess_jpeg),
    (ImageFormatTag::Gif, preprocess_gif),
];

fn format_hook(format: ImageFormatTag) -> Option<FormatHook> {
    FORMAT_HOOKS
        .iter()
        .find(|(tag, _)| *tag == format)
        .map(|(_, hook)| *hook)
}

/// Run orientation correction and the format hook, returning the image to
/// transform and the parameters to encode the result with.
pub fn preprocess(
    image: DynamicImage,
    orientation: Orientation,
    format: ImageFormatTag,
    defaults: &EncodeDefaults,
) -> (DynamicImage, SaveParams) {
    let image = apply_orientation(image, orientation);
    let mut params = SaveParams::new(format);
    let image = match format_hook(format) {
        Some(hook) => hook(image, defaults, &mut params),
        None => image,
    };
    (image, params)
}

/// Undo rotation-only EXIF orientations.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Rotate180 => image.rotate180(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Rotate270 => image.rotate270(),
        _ => image,
    }
}

fn preprocess_jpeg(
    image: DynamicImage,
    defaults: &EncodeDefaults,
    params: &mut SaveParams,
) -> DynamicImage {
    params.quality = Some(defaults.jpeg_quality);
    match image {
        DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn preprocess_gif(
    image: DynamicImage,
    _defaults: &EncodeDefaults,
    params: &mut SaveParams,
) -> DynamicImage {
    let rgba = image.to_rgba8();
    params.transparency = rgba.pixels().any(|p| p.0[3] < u8::MAX);
    params.palette = extract_palette(rgba.pixels().copied());
    image
}

/// Distinct colours of an image, or `None` if there are more than an
/// indexed image can hold.
pub fn extract_palette(pixels: impl Iterator<Item = Rgba<u8>>) -> Option<Palette> {
    let mut seen = HashSet::new();
    let mut colors = Vec::new();
    for pixel in pixels {
        if seen.insert(pixel.0) {
            if colors.len() == Palette::MAX_COLORS {
                return None;
            }
            colors.push(pixel);
        }
    }
    Palette::new(colors)
}
