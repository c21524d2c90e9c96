//! Shared test utilities for the renditions test suite.
//!
//! Source images are synthesized with the `image` crate rather than read
//! from fixture files, so every test controls exactly what it decodes.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let storage = Arc::new(MemoryStorage::new("/media"));
//! storage.insert("photo.png", png_bytes(40, 30));
//!
//! let engine = engine_with(Settings::default());
//! let mut image = engine.bind(storage, Some("photo.png")).unwrap();
//! ```

use crate::cache::MemoryCache;
use crate::config::Settings;
use crate::engine::Engine;
use crate::transforms::builtin_registry;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

// =========================================================================
// Synthetic images
// =========================================================================

/// Horizontal gradient with a solid right quarter, so crops and resizes
/// produce visibly different output.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if x * 4 >= width * 3 {
            Rgb([0, 0, 255])
        } else {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 64])
        }
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(gradient(width, height)), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(gradient(width, height)), ImageFormat::Jpeg)
}

/// Two-colour GIF: red left half, blue right half.
pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        if x * 2 < width {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Gif)
}

/// Insert an EXIF APP1 segment carrying `orientation` right after the
/// JPEG start-of-image marker.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    let [hi, lo] = orientation.to_be_bytes();
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    // Big-endian TIFF header, first IFD at offset 8.
    app1.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    // One entry: tag 0x0112 (Orientation), SHORT, count 1.
    app1.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[hi, lo, 0x00, 0x00]);
    // No next IFD.
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Engines
// =========================================================================

/// Engine with the built-in transforms, a fresh in-memory cache and
/// `settings`.
pub fn engine_with(settings: Settings) -> Arc<Engine> {
    let registry = builtin_registry().unwrap();
    Arc::new(Engine::new(registry, Arc::new(MemoryCache::new()), settings).unwrap())
}
