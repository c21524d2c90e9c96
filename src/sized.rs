//! Sizers: renditions addressed by a `WxH` key.
//!
//! A [`SizedImage`] binds one registered sizer to one source. Asking it for
//! `"400x300"` computes the rendition path, creates the file on demand and
//! returns a [`SizedImageInstance`] with its storage name and public URL.
//! Results are memoized per size for the lifetime of the binding.

use crate::imaging::SaveParams;
use crate::naming::{PathCodec, placeholder_service_url};
use crate::ppoi::Ppoi;
use crate::processed::{ProcessedImage, RenditionError, Source};
use crate::registry::TransformRegistry;
use image::DynamicImage;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A width x height transform.
///
/// Implementations must be deterministic: the same input image and
/// parameters always produce the same pixels.
pub trait Sizer: Send + Sync {
    /// Identifies this sizer in rendition filenames.
    fn filename_key(&self) -> &str;

    /// Whether output depends on the primary point of interest. If so, the
    /// PPOI is part of every rendition filename.
    fn uses_ppoi(&self) -> bool {
        false
    }

    /// Regex matching the filename key as it appears in rendition names,
    /// used to recognise this sizer's files when deleting.
    fn filename_key_regex(&self) -> String {
        let key = regex::escape(self.filename_key());
        if self.uses_ppoi() {
            format!("{key}-c[0-9-]+__[0-9-]+")
        } else {
            key
        }
    }

    fn process_image(
        &self,
        image: DynamicImage,
        params: &SaveParams,
        width: u32,
        height: u32,
        ppoi: Ppoi,
    ) -> Result<DynamicImage, RenditionError>;
}

/// Parse a `"WxH"` size key into positive dimensions.
pub fn parse_size_key(key: &str) -> Result<(u32, u32), RenditionError> {
    let malformed = || RenditionError::MalformedKey(key.to_string());
    let (width, height) = key.split_once('x').ok_or_else(malformed)?;
    let width: u32 = width.parse().map_err(|_| malformed())?;
    let height: u32 = height.parse().map_err(|_| malformed())?;
    if width == 0 || height == 0 {
        return Err(malformed());
    }
    Ok((width, height))
}

/// A resolved sized rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedImageInstance {
    /// Storage path; empty for external placeholder URLs.
    pub name: String,
    pub url: String,
}

impl fmt::Display for SizedImageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// One sizer bound to one source.
#[derive(Clone)]
pub struct SizedImage {
    image: ProcessedImage,
    sizer: Arc<dyn Sizer>,
    ppoi: Ppoi,
    instances: HashMap<(u32, u32), SizedImageInstance>,
}

impl SizedImage {
    pub fn new(image: ProcessedImage, sizer: Arc<dyn Sizer>, ppoi: Ppoi) -> Self {
        Self {
            image,
            sizer,
            ppoi,
            instances: HashMap::new(),
        }
    }

    /// Filename key including the PPOI discriminator when the sizer uses one.
    pub fn filename_key(&self) -> String {
        PathCodec::sizer_key(
            self.sizer.filename_key(),
            self.sizer.uses_ppoi().then_some(self.ppoi),
        )
    }

    /// Resolve the rendition for a `"WxH"` key.
    pub fn get(&mut self, key: &str) -> Result<SizedImageInstance, RenditionError> {
        let (width, height) = parse_size_key(key)?;
        self.get_size(width, height)
    }

    pub fn get_size(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<SizedImageInstance, RenditionError> {
        if let Some(instance) = self.instances.get(&(width, height)) {
            return Ok(instance.clone());
        }
        let instance = self.resolve(width, height)?;
        self.instances.insert((width, height), instance.clone());
        Ok(instance)
    }

    fn resolve(&self, width: u32, height: u32) -> Result<SizedImageInstance, RenditionError> {
        match self.image.source() {
            Source::PlaceholderService { base_url } => Ok(SizedImageInstance {
                name: String::new(),
                url: placeholder_service_url(base_url, width, height),
            }),
            Source::Missing => Err(RenditionError::MissingSource),
            Source::Stored(source_path) => {
                let name = self.image.codec().sized_path(
                    source_path,
                    &self.filename_key(),
                    width,
                    height,
                );
                let (sizer, ppoi) = (&self.sizer, self.ppoi);
                let url = self.image.derive(source_path, &name, |image, params| {
                    sizer.process_image(image, params, width, height, ppoi)
                })?;
                Ok(SizedImageInstance { name, url })
            }
        }
    }
}

/// Bind every registered sizer to `image`, keyed by registered name.
pub fn bind_sizers(
    image: &ProcessedImage,
    registry: &TransformRegistry,
    ppoi: Ppoi,
) -> BTreeMap<String, SizedImage> {
    registry
        .sizers()
        .map(|(name, sizer)| {
            (
                name.to_string(),
                SizedImage::new(image.clone(), sizer.clone(), ppoi),
            )
        })
        .collect()
}
