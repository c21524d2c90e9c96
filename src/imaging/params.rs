//! Parameter types for encoding renditions.
//!
//! These structs describe *how* a transformed image is written back out. They
//! are produced by [`preprocess`](super::preprocess) from the source image and
//! the configured defaults, optionally consulted by a transform, and finally
//! handed to [`codec::encode`](super::codec::encode).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 70). Clamped on construction.
//! - [`Palette`]: Up to 256 colours captured from an indexed (GIF) source.
//! - [`SaveParams`]: Everything an encode needs: format, quality, transparency,
//!   palette and colour profile.

use super::format::ImageFormatTag;
use image::Rgba;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Colour table of an indexed source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(Vec<Rgba<u8>>);

impl Palette {
    /// Maximum number of entries an indexed image can carry.
    pub const MAX_COLORS: usize = 256;

    /// Build a palette, refusing empty or oversized colour lists.
    pub fn new(colors: Vec<Rgba<u8>>) -> Option<Self> {
        if colors.is_empty() || colors.len() > Self::MAX_COLORS {
            None
        } else {
            Some(Self(colors))
        }
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.0
    }

    /// Closest palette entry by squared RGBA distance.
    pub fn nearest(&self, pixel: Rgba<u8>) -> Rgba<u8> {
        let mut best = self.0[0];
        let mut best_dist = u32::MAX;
        for &candidate in &self.0 {
            let dist: u32 = pixel
                .0
                .iter()
                .zip(candidate.0.iter())
                .map(|(a, b)| {
                    let d = *a as i32 - *b as i32;
                    (d * d) as u32
                })
                .sum();
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }
}

/// Everything the encoder needs to write a rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    pub format: ImageFormatTag,
    /// Lossy quality, set for formats that use one (JPEG).
    pub quality: Option<Quality>,
    /// Source carried an alpha channel that must survive re-encoding.
    pub transparency: bool,
    /// Colour table of an indexed source, reapplied after resampling.
    pub palette: Option<Palette>,
    /// ICC profile of the source, embedded where the format allows it.
    pub icc_profile: Option<Vec<u8>>,
}

impl SaveParams {
    pub fn new(format: ImageFormatTag) -> Self {
        Self {
            format,
            quality: None,
            transparency: false,
            palette: None,
            icc_profile: None,
        }
    }
}
