//! The rendition pipeline shared by sizers and filters.
//!
//! Creating a rendition always runs the same stages:
//!
//! ```text
//! storage.open ─▶ decode ─▶ preprocess ─▶ transform ─▶ encode ─▶ storage.save
//!                           (orientation,  (sizer or
//!                            format hook)   filter)
//! ```
//!
//! and is wrapped in the existence-cache protocol ([`ProcessedImage::derive`]):
//!
//! 1. cache hit on the rendition URL → done, nothing touches storage;
//! 2. miss → ask storage; create only if the file is absent;
//! 3. either way, remember the URL in the cache.
//!
//! Creation is deterministic, so two callers racing on the same missing
//! rendition both write identical bytes and the last write wins. No lock is
//! taken.

use crate::cache::{EXISTS, ExistenceCache};
use crate::imaging::{self, CodecError, EncodeDefaults, ImageFormatTag, SaveParams};
use crate::naming::PathCodec;
use crate::storage::{Storage, StorageError};
use image::DynamicImage;
use image::metadata::Orientation;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Request-time failures.
#[derive(Error, Debug)]
pub enum RenditionError {
    #[error(
        "{0} is an invalid size. All sizes must be formatted as '{{width}}x{{height}}' \
         with positive integers, e.g. '400x400'"
    )]
    MalformedKey(String),
    #[error("'{0}' is not a registered filter")]
    InvalidFilter(String),
    #[error("'{0}' is not a registered sizer")]
    UnknownSizer(String),
    #[error("Image has no source and no placeholder is configured")]
    MissingSource,
    #[error("'{0}' is not a valid image key")]
    InvalidImageKey(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Transform '{name}' failed: {message}")]
    Transform { name: String, message: String },
}

/// What renditions are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file on the bound storage (a real source or an installed placeholder).
    Stored(String),
    /// No file; sized renditions are URLs on an external placeholder service.
    PlaceholderService { base_url: String },
    Missing,
}

/// A decoded source, ready for preprocessing.
#[derive(Debug)]
pub struct RetrievedImage {
    pub image: DynamicImage,
    pub orientation: Orientation,
    pub format: ImageFormatTag,
    pub icc_profile: Option<Vec<u8>>,
}

/// A source bound to the storage, cache and naming it derives renditions with.
#[derive(Clone)]
pub struct ProcessedImage {
    source: Source,
    storage: Arc<dyn Storage>,
    cache: Arc<dyn ExistenceCache>,
    codec: Arc<PathCodec>,
    cache_ttl: Duration,
    create_on_demand: bool,
}

impl ProcessedImage {
    pub fn new(
        source: Source,
        storage: Arc<dyn Storage>,
        cache: Arc<dyn ExistenceCache>,
        codec: Arc<PathCodec>,
        cache_ttl: Duration,
        create_on_demand: bool,
    ) -> Self {
        Self {
            source,
            storage,
            cache,
            codec,
            cache_ttl,
            create_on_demand,
        }
    }

    /// The same bindings over a different source.
    pub fn with_source(&self, source: Source) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    pub fn create_on_demand(&self) -> bool {
        self.create_on_demand
    }

    /// Read and decode the image at `path`; the format comes from its extension.
    pub fn retrieve_image(&self, path: &str) -> Result<RetrievedImage, RenditionError> {
        let bytes = self.storage.open(path)?;
        let decoded = imaging::decode(&bytes)?;
        Ok(RetrievedImage {
            image: decoded.image,
            orientation: decoded.orientation,
            format: ImageFormatTag::from_path(path),
            icc_profile: decoded.icc_profile,
        })
    }

    /// Orientation correction and format hook; returns the image to
    /// transform and how to encode the result. The source's colour profile
    /// rides along in the parameters.
    pub fn preprocess(&self, retrieved: RetrievedImage) -> (DynamicImage, SaveParams) {
        let defaults = EncodeDefaults {
            jpeg_quality: self.codec.jpeg_quality,
        };
        let (image, mut params) = imaging::preprocess::preprocess(
            retrieved.image,
            retrieved.orientation,
            retrieved.format,
            &defaults,
        );
        params.icc_profile = retrieved.icc_profile;
        (image, params)
    }

    pub fn save_image(
        &self,
        image: &DynamicImage,
        params: &SaveParams,
        path: &str,
    ) -> Result<(), RenditionError> {
        let bytes = imaging::encode(image, params)?;
        self.storage.save(path, &bytes, params.format.mime_type())?;
        Ok(())
    }

    /// Run the full pipeline from `source_path` to `target_path`.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(source = source_path, target = target_path)
    )]
    pub fn create_rendition<F>(
        &self,
        source_path: &str,
        target_path: &str,
        transform: F,
    ) -> Result<(), RenditionError>
    where
        F: FnOnce(DynamicImage, &SaveParams) -> Result<DynamicImage, RenditionError>,
    {
        let retrieved = self.retrieve_image(source_path)?;
        let (image, params) = self.preprocess(retrieved);
        let image = transform(image, &params)?;
        self.save_image(&image, &params, target_path)?;
        tracing::info!(source = source_path, path = target_path, "created rendition");
        Ok(())
    }

    /// Existence-cache protocol around `create`.
    pub fn ensure_created<F>(&self, path: &str, url: &str, create: F) -> Result<(), RenditionError>
    where
        F: FnOnce() -> Result<(), RenditionError>,
    {
        if self.cache.get(url).is_some() {
            tracing::debug!(url, "existence cache hit");
            return Ok(());
        }
        tracing::debug!(url, "existence cache miss");
        if !self.storage.exists(path)? {
            create()?;
        }
        self.cache.set(url, EXISTS, self.cache_ttl);
        Ok(())
    }

    /// Public URL of the rendition at `target_path`, created from
    /// `source_path` first when creating on demand.
    pub fn derive<F>(
        &self,
        source_path: &str,
        target_path: &str,
        transform: F,
    ) -> Result<String, RenditionError>
    where
        F: FnOnce(DynamicImage, &SaveParams) -> Result<DynamicImage, RenditionError>,
    {
        let url = self.storage.url(target_path);
        if self.create_on_demand {
            self.ensure_created(target_path, &url, || {
                self.create_rendition(source_path, target_path, transform)
            })?;
        }
        Ok(url)
    }
}
