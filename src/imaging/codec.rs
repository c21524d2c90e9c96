//! Decode and encode primitives over the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (content-sniffed) | `image::ImageReader::with_guessed_format` |
//! | EXIF orientation | `image::ImageDecoder::orientation` |
//! | ICC profile | `ImageDecoder::icc_profile` / `ImageEncoder::set_icc_profile` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode PNG, WebP | `PngEncoder`, `WebPEncoder::new_lossless` |
//! | Encode everything else | `DynamicImage::write_to` |
//!
//! The source's ICC profile is written back for JPEG, PNG and WebP; the
//! remaining formats are encoded without one.

use super::format::ImageFormatTag;
use super::params::SaveParams;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {format:?}: {message}")]
    Encode {
        format: ImageFormatTag,
        message: String,
    },
}

/// A decoded image plus the metadata the preprocessing step needs.
#[derive(Debug)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Orientation recorded in the source's EXIF data, if any.
    pub orientation: Orientation,
    /// Embedded colour profile, carried over to the rendition.
    pub icc_profile: Option<Vec<u8>>,
}

/// Decode image bytes, sniffing the container format from content.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, CodecError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().ok().flatten();
    let image =
        DynamicImage::from_decoder(decoder).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(DecodedImage {
        image,
        orientation,
        icc_profile,
    })
}

/// Encode `image` according to `params`.
///
/// Pixel layouts are normalized first: JPEG, PNM and non-transparent outputs
/// are written as 8-bit RGB, everything else as 8-bit RGBA.
pub fn encode(image: &DynamicImage, params: &SaveParams) -> Result<Vec<u8>, CodecError> {
    let encode_err = |e: image::ImageError| CodecError::Encode {
        format: params.format,
        message: e.to_string(),
    };

    let mut buf = Vec::new();
    match params.format {
        ImageFormatTag::Jpeg => {
            let quality = params.quality.unwrap_or_default();
            let encoder = with_icc_profile(
                JpegEncoder::new_with_quality(&mut buf, quality.value()),
                params,
            );
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        ImageFormatTag::Png => {
            let encoder = with_icc_profile(PngEncoder::new(&mut buf), params);
            normalize_for(image, ImageFormatTag::Png, params.transparency)
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        ImageFormatTag::WebP => {
            let encoder = with_icc_profile(WebPEncoder::new_lossless(&mut buf), params);
            normalize_for(image, ImageFormatTag::WebP, params.transparency)
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        format => {
            let normalized = normalize_for(image, format, params.transparency);
            normalized
                .write_to(&mut Cursor::new(&mut buf), format.image_format())
                .map_err(encode_err)?;
        }
    }
    Ok(buf)
}

fn with_icc_profile<E: ImageEncoder>(mut encoder: E, params: &SaveParams) -> E {
    if let Some(profile) = &params.icc_profile {
        if let Err(err) = encoder.set_icc_profile(profile.clone()) {
            tracing::debug!(format = ?params.format, error = %err, "ICC profile dropped");
        }
    }
    encoder
}

fn normalize_for(image: &DynamicImage, format: ImageFormatTag, transparency: bool) -> DynamicImage {
    let keep_alpha = transparency || image.color().has_alpha();
    match format {
        ImageFormatTag::Pnm => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormatTag::Gif => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ if keep_alpha => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}
