//! Built-in transforms.
//!
//! | Name | Kind | Behaviour |
//! |---|---|---|
//! | `crop` | sizer | Exact box, framed around the PPOI |
//! | `thumbnail` | sizer | Fit inside the box, aspect preserved, never upscaled |
//! | `invert` | filter | Invert RGB channels |

use crate::filtered::Filter;
use crate::imaging::operations;
use crate::imaging::{ImageFormatTag, SaveParams};
use crate::ppoi::Ppoi;
use crate::processed::RenditionError;
use crate::registry::{
    DiscoveryError, PluginError, Transform, TransformPlugin, TransformRegistry,
};
use crate::sized::Sizer;
use image::DynamicImage;

/// Fills the box exactly: covers it, then crops inward toward the PPOI.
///
/// GIF output is snapped back onto the source palette, since resampling
/// invents colours the indexed original never had.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropSizer;

impl Sizer for CropSizer {
    fn filename_key(&self) -> &str {
        "crop"
    }

    fn uses_ppoi(&self) -> bool {
        true
    }

    fn process_image(
        &self,
        image: DynamicImage,
        params: &SaveParams,
        width: u32,
        height: u32,
        ppoi: Ppoi,
    ) -> Result<DynamicImage, RenditionError> {
        let cropped = operations::crop_on_centerpoint(&image, width, height, ppoi);
        Ok(match (&params.palette, params.format) {
            (Some(palette), ImageFormatTag::Gif) => operations::apply_palette(&cropped, palette),
            _ => cropped,
        })
    }
}

/// Scales down to fit inside the box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailSizer;

impl Sizer for ThumbnailSizer {
    fn filename_key(&self) -> &str {
        "thumbnail"
    }

    fn process_image(
        &self,
        image: DynamicImage,
        _params: &SaveParams,
        width: u32,
        height: u32,
        _ppoi: Ppoi,
    ) -> Result<DynamicImage, RenditionError> {
        Ok(operations::thumbnail(image, width, height))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvertFilter;

impl Filter for InvertFilter {
    fn process_filter(
        &self,
        image: DynamicImage,
        _params: &SaveParams,
    ) -> Result<DynamicImage, RenditionError> {
        Ok(operations::invert(&image))
    }
}

/// Registers `crop`, `thumbnail` and `invert`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTransforms;

impl TransformPlugin for BuiltinTransforms {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, registry: &mut TransformRegistry) -> Result<(), PluginError> {
        registry.register_sizer("crop", Transform::sizer(CropSizer))?;
        registry.register_sizer("thumbnail", Transform::sizer(ThumbnailSizer))?;
        registry.register_filter("invert", Transform::filter(InvertFilter))?;
        Ok(())
    }
}

/// A registry holding only the built-in transforms.
pub fn builtin_registry() -> Result<TransformRegistry, DiscoveryError> {
    let mut registry = TransformRegistry::new();
    registry.discover(&[&BuiltinTransforms])?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Palette;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn two_tone() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }))
    }

    #[test]
    fn builtin_registry_contents() {
        let registry = builtin_registry().unwrap();
        assert_eq!(
            registry.sizer_names().collect::<Vec<_>>(),
            vec!["crop", "thumbnail"]
        );
        assert_eq!(registry.filter_names().collect::<Vec<_>>(), vec!["invert"]);
    }

    #[test]
    fn builtin_plugin_twice_conflicts() {
        let mut registry = builtin_registry().unwrap();
        let err = registry.discover(&[&BuiltinTransforms]).unwrap_err();
        assert_eq!(err.plugin, "builtin");
        assert_eq!(registry.sizer_names().count(), 2);
    }

    #[test]
    fn crop_gives_exact_box() {
        let params = SaveParams::new(ImageFormatTag::Png);
        let out = CropSizer
            .process_image(two_tone(), &params, 7, 9, Ppoi::CENTER)
            .unwrap();
        assert_eq!(out.dimensions(), (7, 9));
    }

    #[test]
    fn gif_crop_stays_on_palette() {
        let palette = Palette::new(vec![Rgba([255, 0, 0, 255]), Rgba([0, 0, 255, 255])]).unwrap();
        let params = SaveParams {
            palette: Some(palette.clone()),
            ..SaveParams::new(ImageFormatTag::Gif)
        };
        let out = CropSizer
            .process_image(two_tone(), &params, 9, 9, Ppoi::CENTER)
            .unwrap();
        for pixel in out.to_rgba8().pixels() {
            assert!(palette.colors().contains(pixel));
        }
    }

    #[test]
    fn thumbnail_preserves_aspect() {
        let params = SaveParams::new(ImageFormatTag::Png);
        let out = ThumbnailSizer
            .process_image(two_tone(), &params, 10, 10, Ppoi::CENTER)
            .unwrap();
        assert_eq!(out.dimensions(), (10, 5));
    }

    #[test]
    fn invert_filter_inverts() {
        let params = SaveParams::new(ImageFormatTag::Png);
        let out = InvertFilter.process_filter(two_tone(), &params).unwrap();
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [0, 255, 255]);
    }
}
