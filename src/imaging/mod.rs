//! Image processing primitives: pure Rust, via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (content-sniffed) |
//! | **EXIF orientation** | `ImageDecoder::orientation` + `rotate90/180/270` |
//! | **Crop to box** | PPOI-biased box + `resize_exact` (Lanczos3) |
//! | **Thumbnail** | `resize` (Lanczos3), never upscaling |
//! | **Invert** | `DynamicImage::invert` |
//! | **Encode** | `JpegEncoder` with quality, `write_to` for the rest |
//!
//! The module is split into:
//! - **Format**: extension → format/mime lookup
//! - **Calculations**: Pure functions for crop framing (unit testable)
//! - **Parameters**: Data structures describing how to encode a rendition
//! - **Preprocess**: Orientation correction and per-format hooks
//! - **Operations**: Pixel transforms combining calculations + `image`
//! - **Codec**: Decode/encode over byte buffers

pub mod calculations;
pub mod codec;
pub mod format;
pub mod operations;
mod params;
pub mod preprocess;

pub use codec::{CodecError, DecodedImage, decode, encode};
pub use format::ImageFormatTag;
pub use params::{Palette, Quality, SaveParams};
pub use preprocess::EncodeDefaults;
