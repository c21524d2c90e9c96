//! Filters: parameterless renditions, and sizers chained after them.
//!
//! `library.get("invert")` materializes `{folder}/__filtered__/{name}__invert__.{ext}`
//! and returns a [`FilteredImage`]. Every registered sizer is bound on top
//! of it with the filtered file as their source, so
//! `get("invert")?.sizer("crop")?.get("100x100")` inverts first and crops
//! the inverted image.

use crate::imaging::SaveParams;
use crate::ppoi::Ppoi;
use crate::processed::{ProcessedImage, RenditionError, Source};
use crate::registry::TransformRegistry;
use crate::sized::{SizedImage, bind_sizers};
use image::DynamicImage;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A parameterless image transform.
pub trait Filter: Send + Sync {
    fn process_filter(
        &self,
        image: DynamicImage,
        params: &SaveParams,
    ) -> Result<DynamicImage, RenditionError>;
}

/// A resolved filtered rendition with sizers bound on top of it.
#[derive(Clone)]
pub struct FilteredImage {
    name: String,
    url: String,
    sizers: BTreeMap<String, SizedImage>,
}

impl FilteredImage {
    /// Inert stand-in used when sized URLs come from a placeholder service.
    /// Its name and URL are empty; its sizers still produce service URLs.
    fn dummy(sizers: BTreeMap<String, SizedImage>) -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            sizers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_dummy(&self) -> bool {
        self.name.is_empty()
    }

    pub fn sizer(&mut self, name: &str) -> Result<&mut SizedImage, RenditionError> {
        self.sizers
            .get_mut(name)
            .ok_or_else(|| RenditionError::UnknownSizer(name.to_string()))
    }

    pub fn sizer_names(&self) -> impl Iterator<Item = &str> {
        self.sizers.keys().map(String::as_str)
    }
}

impl fmt::Display for FilteredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Lazily resolved filters of one source, keyed by filter name.
#[derive(Clone)]
pub struct FilterLibrary {
    image: ProcessedImage,
    registry: Arc<TransformRegistry>,
    ppoi: Ppoi,
    filters: HashMap<String, FilteredImage>,
}

impl FilterLibrary {
    pub fn new(image: ProcessedImage, registry: Arc<TransformRegistry>, ppoi: Ppoi) -> Self {
        Self {
            image,
            registry,
            ppoi,
            filters: HashMap::new(),
        }
    }

    /// Resolve the filter registered as `name`, creating the rendition on
    /// demand. Repeated calls return the memoized result.
    pub fn get(&mut self, name: &str) -> Result<&mut FilteredImage, RenditionError> {
        if !self.filters.contains_key(name) {
            let filtered = self.resolve(name)?;
            self.filters.insert(name.to_string(), filtered);
        }
        self.filters
            .get_mut(name)
            .ok_or_else(|| RenditionError::InvalidFilter(name.to_string()))
    }

    fn resolve(&self, name: &str) -> Result<FilteredImage, RenditionError> {
        let filter = self
            .registry
            .filter(name)
            .ok_or_else(|| RenditionError::InvalidFilter(name.to_string()))?;

        match self.image.source() {
            Source::PlaceholderService { .. } => Ok(FilteredImage::dummy(bind_sizers(
                &self.image,
                &self.registry,
                self.ppoi,
            ))),
            Source::Missing => Err(RenditionError::MissingSource),
            Source::Stored(source_path) => {
                let target = self.image.codec().filtered_path(source_path, name);
                let url = self.image.derive(source_path, &target, |image, params| {
                    filter.process_filter(image, params)
                })?;
                let composed = self.image.with_source(Source::Stored(target.clone()));
                Ok(FilteredImage {
                    name: target,
                    url,
                    sizers: bind_sizers(&composed, &self.registry, self.ppoi),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::naming::PathCodec;
    use crate::storage::MemoryStorage;
    use crate::test_helpers::{gif_bytes, png_bytes};
    use crate::transforms::builtin_registry;
    use std::time::Duration;

    fn library(storage: Arc<MemoryStorage>, source: Source) -> FilterLibrary {
        let image = ProcessedImage::new(
            source,
            storage,
            Arc::new(MemoryCache::new()),
            Arc::new(PathCodec::default()),
            Duration::from_secs(60),
            true,
        );
        FilterLibrary::new(image, Arc::new(builtin_registry().unwrap()), Ppoi::CENTER)
    }

    #[test]
    fn unknown_filter_is_invalid() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        let mut filters = library(storage.clone(), Source::Stored("photo.png".into()));
        assert!(matches!(
            filters.get("sepia"),
            Err(RenditionError::InvalidFilter(name)) if name == "sepia"
        ));
        assert!(storage.operations().is_empty());
    }

    #[test]
    fn invert_creates_filtered_file() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        storage.insert("photo.gif", gif_bytes(20, 10));
        let mut filters = library(storage.clone(), Source::Stored("photo.gif".into()));

        let inverted = filters.get("invert").unwrap();
        assert_eq!(inverted.name(), "__filtered__/photo__invert__.gif");
        assert_eq!(inverted.url(), "/media/__filtered__/photo__invert__.gif");
        assert!(!inverted.is_dummy());
        assert!(storage.get("__filtered__/photo__invert__.gif").is_some());
    }

    #[test]
    fn filtered_sizers_use_filtered_source() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        storage.insert("photo.gif", gif_bytes(20, 10));
        let mut filters = library(storage.clone(), Source::Stored("photo.gif".into()));

        let crop = filters.get("invert").unwrap().sizer("crop").unwrap().get("5x5").unwrap();
        assert_eq!(
            crop.name,
            "__sized__/__filtered__/photo__invert__-crop-c0-5__0-5-5x5.gif"
        );
        assert!(storage.get(&crop.name).is_some());
    }

    #[test]
    fn repeated_get_is_memoized() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        storage.insert("photo.png", png_bytes(4, 4));
        let mut filters = library(storage.clone(), Source::Stored("photo.png".into()));

        filters.get("invert").unwrap();
        storage.clear_operations();
        filters.get("invert").unwrap();
        assert!(storage.operations().is_empty());
    }

    #[test]
    fn placeholder_service_gives_dummy_with_service_sizers() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        let source = Source::PlaceholderService {
            base_url: "http://placehold.it".into(),
        };
        let mut filters = library(storage.clone(), source);

        let dummy = filters.get("invert").unwrap();
        assert!(dummy.is_dummy());
        assert_eq!(dummy.url(), "");
        assert_eq!(dummy.to_string(), "");
        let sized = dummy.sizer("crop").unwrap().get("30x20").unwrap();
        assert_eq!(sized.url, "http://placehold.it/30x20");
        assert!(storage.operations().is_empty());
    }

    #[test]
    fn unknown_sizer_on_filtered_image() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        storage.insert("photo.png", png_bytes(4, 4));
        let mut filters = library(storage, Source::Stored("photo.png".into()));
        assert!(matches!(
            filters.get("invert").unwrap().sizer("zoom"),
            Err(RenditionError::UnknownSizer(_))
        ));
    }
}
