//! File extension → image format lookup.
//!
//! Renditions are always written in the format their file extension implies,
//! which is also how the source's format is identified. Unknown or missing
//! extensions fall back to JPEG.

use image::ImageFormat;

/// Formats the engine can decode, preprocess and re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormatTag {
    Bmp,
    Gif,
    Jpeg,
    Png,
    Pnm,
    Tiff,
    WebP,
}

const EXTENSIONS: &[(&str, ImageFormatTag)] = &[
    ("png", ImageFormatTag::Png),
    ("jpe", ImageFormatTag::Jpeg),
    ("jpeg", ImageFormatTag::Jpeg),
    ("jpg", ImageFormatTag::Jpeg),
    ("gif", ImageFormatTag::Gif),
    ("bmp", ImageFormatTag::Bmp),
    ("dib", ImageFormatTag::Bmp),
    ("pbm", ImageFormatTag::Pnm),
    ("pgm", ImageFormatTag::Pnm),
    ("ppm", ImageFormatTag::Pnm),
    ("tif", ImageFormatTag::Tiff),
    ("tiff", ImageFormatTag::Tiff),
    ("webp", ImageFormatTag::WebP),
];

impl ImageFormatTag {
    /// Look up a format by extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Self {
        EXTENSIONS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|(_, tag)| *tag)
            .unwrap_or(ImageFormatTag::Jpeg)
    }

    /// Format of a storage path, judged by the text after its last `.`.
    pub fn from_path(path: &str) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => ImageFormatTag::Jpeg,
        }
    }

    /// MIME type stored alongside a rendition of this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormatTag::Bmp => "image/bmp",
            ImageFormatTag::Gif => "image/gif",
            ImageFormatTag::Jpeg => "image/jpeg",
            ImageFormatTag::Png => "image/png",
            ImageFormatTag::Pnm => "image/x-portable-anymap",
            ImageFormatTag::Tiff => "image/tiff",
            ImageFormatTag::WebP => "image/webp",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageFormatTag::Bmp => ImageFormat::Bmp,
            ImageFormatTag::Gif => ImageFormat::Gif,
            ImageFormatTag::Jpeg => ImageFormat::Jpeg,
            ImageFormatTag::Png => ImageFormat::Png,
            ImageFormatTag::Pnm => ImageFormat::Pnm,
            ImageFormatTag::Tiff => ImageFormat::Tiff,
            ImageFormatTag::WebP => ImageFormat::WebP,
        }
    }
}
