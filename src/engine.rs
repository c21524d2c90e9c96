//! Process-wide rendition context.
//!
//! An [`Engine`] is built once at start up from a discovered
//! [`TransformRegistry`], an existence cache and validated [`Settings`].
//! It is shared (behind an `Arc`) by every [`BoundImage`] created from it.

use crate::binder::BoundImage;
use crate::cache::{CacheBackend, ExistenceCache, ManifestCache, MemoryCache, NullCache};
use crate::config::{ConfigError, RenditionConfig, Settings};
use crate::lifecycle::DeletionPatterns;
use crate::naming::PathCodec;
use crate::processed::RenditionError;
use crate::registry::{DiscoveryError, TransformPlugin, TransformRegistry};
use crate::storage::Storage;
use crate::transforms::{BuiltinTransforms, builtin_registry};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Invalid transform key pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Build the existence cache selected by `backend`. The manifest backend
/// keeps its file in `dir`.
pub fn open_cache(backend: CacheBackend, dir: &Path) -> Arc<dyn ExistenceCache> {
    match backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Manifest => Arc::new(ManifestCache::in_dir(dir)),
        CacheBackend::None => Arc::new(NullCache),
    }
}

pub struct Engine {
    registry: Arc<TransformRegistry>,
    cache: Arc<dyn ExistenceCache>,
    settings: Settings,
    codec: Arc<PathCodec>,
    patterns: DeletionPatterns,
}

impl Engine {
    pub fn new(
        registry: TransformRegistry,
        cache: Arc<dyn ExistenceCache>,
        settings: Settings,
    ) -> Result<Self, EngineError> {
        let patterns = DeletionPatterns::new(&registry, settings.codec.post_processor)?;
        Ok(Self {
            registry: Arc::new(registry),
            cache,
            codec: Arc::new(settings.codec.clone()),
            settings,
            patterns,
        })
    }

    /// Built-in transforms, in-memory cache, default settings.
    pub fn with_defaults() -> Result<Self, EngineError> {
        let registry = builtin_registry()?;
        Self::new(registry, Arc::new(MemoryCache::new()), Settings::default())
    }

    /// Validate `config`, discover the built-in transforms plus `plugins`,
    /// and open the configured cache (a manifest cache lives in `cache_dir`).
    pub fn from_config(
        config: &RenditionConfig,
        plugins: &[&dyn TransformPlugin],
        cache_dir: &Path,
    ) -> Result<Self, EngineError> {
        let settings = Settings::from_config(config)?;
        let mut registry = TransformRegistry::new();
        registry.discover(&[&BuiltinTransforms])?;
        registry.discover(plugins)?;
        let cache = open_cache(settings.cache_backend, cache_dir);
        Self::new(registry, cache, settings)
    }

    /// Bind a source path (or its absence) on `storage`.
    pub fn bind(
        self: &Arc<Self>,
        storage: Arc<dyn Storage>,
        path: Option<&str>,
    ) -> Result<BoundImage, RenditionError> {
        BoundImage::new(Arc::clone(self), storage, path)
    }

    pub fn registry(&self) -> &Arc<TransformRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<dyn ExistenceCache> {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn codec(&self) -> &Arc<PathCodec> {
        &self.codec
    }

    pub fn patterns(&self) -> &DeletionPatterns {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EXISTS;
    use crate::registry::{PluginError, Transform};
    use crate::transforms::ThumbnailSizer;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Square;

    impl TransformPlugin for Square {
        fn name(&self) -> &str {
            "square"
        }

        fn register(&self, registry: &mut TransformRegistry) -> Result<(), PluginError> {
            registry.register_sizer("square", Transform::sizer(ThumbnailSizer))?;
            Ok(())
        }
    }

    #[test]
    fn defaults_register_builtins() {
        let engine = Engine::with_defaults().unwrap();
        assert!(engine.registry().sizer("crop").is_some());
        assert_eq!(engine.codec().sized_dir, "__sized__");
        assert!(engine.patterns().filter().is_some());
    }

    #[test]
    fn from_config_adds_plugins() {
        let tmp = TempDir::new().unwrap();
        let engine =
            Engine::from_config(&RenditionConfig::default(), &[&Square], tmp.path()).unwrap();
        assert_eq!(
            engine.registry().sizer_names().collect::<Vec<_>>(),
            vec!["crop", "square", "thumbnail"]
        );
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let config = RenditionConfig {
            jpeg_resize_quality: 0,
            ..Default::default()
        };
        assert!(matches!(
            Engine::from_config(&config, &[], tmp.path()),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn manifest_backend_persists_in_dir() {
        let tmp = TempDir::new().unwrap();
        let cache = open_cache(CacheBackend::Manifest, tmp.path());
        cache.set("k", EXISTS, Duration::from_secs(60));
        assert!(open_cache(CacheBackend::Manifest, tmp.path()).get("k").is_some());
        assert!(open_cache(CacheBackend::None, tmp.path()).get("k").is_none());
    }
}
