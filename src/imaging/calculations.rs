//! Pure calculation functions for crop framing and fit dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::ppoi::Ppoi;

/// Region of the source image kept by a crop, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate the largest region of `source` with the aspect ratio of `target`,
/// positioned as close to centered on the PPOI as the image edges allow.
///
/// If the source is at least as wide (relative to its height) as the target,
/// the excess is trimmed from the left/right sides; otherwise from top/bottom.
/// The PPOI is converted to an absolute pixel and the box is centered on it,
/// then pushed back inside the image if it overhangs an edge.
///
/// Returns `None` when either the source or the target has a zero dimension.
///
/// # Examples
/// ```
/// # use renditions::imaging::calculations::{CropBox, crop_box_on_centerpoint};
/// # use renditions::Ppoi;
/// // 400x200 landscape cropped to a square, anchored at the left edge
/// let ppoi = Ppoi::new(0.0, 0.0).unwrap();
/// assert_eq!(
///     crop_box_on_centerpoint((400, 200), (100, 100), ppoi),
///     Some(CropBox { left: 0, top: 0, width: 200, height: 200 })
/// );
/// ```
pub fn crop_box_on_centerpoint(
    source: (u32, u32),
    target: (u32, u32),
    ppoi: Ppoi,
) -> Option<CropBox> {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 || tgt_w == 0 || tgt_h == 0 {
        return None;
    }

    let center_x = (src_w as f64 * ppoi.x()) as i64;
    let center_y = (src_h as f64 * ppoi.y()) as i64;
    let src_aspect = src_w as f64 / src_h as f64;
    let crop_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect >= crop_aspect {
        // Wider than needed: trim left/right
        let crop_w = ((crop_aspect * src_h as f64 + 0.5) as i64).clamp(1, src_w as i64);
        let left = clamp_start(center_x - crop_w / 2, crop_w, src_w as i64);
        Some(CropBox {
            left: left as u32,
            top: 0,
            width: crop_w as u32,
            height: src_h,
        })
    } else {
        // Taller than needed: trim top/bottom
        let crop_h = ((src_w as f64 / crop_aspect + 0.5) as i64).clamp(1, src_h as i64);
        let top = clamp_start(center_y - crop_h / 2, crop_h, src_h as i64);
        Some(CropBox {
            left: 0,
            top: top as u32,
            width: src_w,
            height: crop_h as u32,
        })
    }
}

/// Shift a span starting at `start` so that `[start, start + len)` lies
/// inside `[0, limit)`.
fn clamp_start(start: i64, len: i64, limit: i64) -> i64 {
    if start < 0 {
        0
    } else if start + len > limit {
        limit - len
    } else {
        start
    }
}

/// Whether an image of `source` size already fits inside a `bound` box.
pub fn fits_within(source: (u32, u32), bound: (u32, u32)) -> bool {
    source.0 <= bound.0 && source.1 <= bound.1
}
