//! Engine configuration.
//!
//! Handles loading and validating `config.toml`, and turning it into the
//! runtime [`Settings`] the engine is built from.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! cache_length = 2592000            # Existence cache TTL in seconds (30 days)
//! cache_backend = "memory"          # memory | manifest | none
//! jpeg_resize_quality = 70          # 1-100, also embedded in JPEG filenames
//! sized_directory_name = "__sized__"
//! filtered_directory_name = "__filtered__"
//! placeholder_directory_name = "__placeholder__"
//! create_images_on_demand = true
//! # image_key_post_processor = "sha256_16"   # sha256 | sha256_16
//! use_placeholder_service = false
//! placeholder_service_url = "http://placehold.it"
//! # placeholder_image = "assets/placeholder.png"
//!
//! [rendition_key_sets]
//! # gallery = [["full", "url"], ["thumb", "crop__200x200"]]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::CacheBackend;
use crate::imaging::Quality;
use crate::keys::{KeySetError, RenditionKeySet};
use crate::naming::{
    DEFAULT_FILTERED_DIR, DEFAULT_PLACEHOLDER_DIR, DEFAULT_SIZED_DIR, KeyPostProcessor, PathCodec,
};
use crate::placeholder::{DEFAULT_PLACEHOLDER_SERVICE_URL, PlaceholderImage, PlaceholderPolicy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in a root directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Default existence cache TTL: 30 days.
pub const DEFAULT_CACHE_LENGTH: u64 = 2_592_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

impl From<KeySetError> for ConfigError {
    fn from(err: KeySetError) -> Self {
        ConfigError::Validation(err.to_string())
    }
}

/// Configuration as written in `config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenditionConfig {
    /// Existence cache TTL, seconds.
    pub cache_length: u64,
    pub cache_backend: String,
    pub jpeg_resize_quality: u32,
    pub sized_directory_name: String,
    pub filtered_directory_name: String,
    pub placeholder_directory_name: String,
    pub create_images_on_demand: bool,
    pub image_key_post_processor: Option<String>,
    pub use_placeholder_service: bool,
    pub placeholder_service_url: String,
    /// Local placeholder image used for images without a source.
    pub placeholder_image: Option<PathBuf>,
    /// Named lists of `[label, image key]` pairs.
    pub rendition_key_sets: BTreeMap<String, Vec<(String, String)>>,
}

impl Default for RenditionConfig {
    fn default() -> Self {
        Self {
            cache_length: DEFAULT_CACHE_LENGTH,
            cache_backend: "memory".to_string(),
            jpeg_resize_quality: 70,
            sized_directory_name: DEFAULT_SIZED_DIR.to_string(),
            filtered_directory_name: DEFAULT_FILTERED_DIR.to_string(),
            placeholder_directory_name: DEFAULT_PLACEHOLDER_DIR.to_string(),
            create_images_on_demand: true,
            image_key_post_processor: None,
            use_placeholder_service: false,
            placeholder_service_url: DEFAULT_PLACEHOLDER_SERVICE_URL.to_string(),
            placeholder_image: None,
            rendition_key_sets: BTreeMap::new(),
        }
    }
}

impl RenditionConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_resize_quality) {
            return Err(ConfigError::Validation(
                "jpeg_resize_quality must be 1-100".into(),
            ));
        }
        let dirs = [
            ("sized_directory_name", &self.sized_directory_name),
            ("filtered_directory_name", &self.filtered_directory_name),
            ("placeholder_directory_name", &self.placeholder_directory_name),
        ];
        for (key, dir) in dirs {
            if dir.trim().is_empty() || dir.contains('/') || dir.contains(' ') {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a single non-empty path segment without spaces"
                )));
            }
        }
        if dirs[0].1 == dirs[1].1 || dirs[0].1 == dirs[2].1 || dirs[1].1 == dirs[2].1 {
            return Err(ConfigError::Validation(
                "sized, filtered and placeholder directory names must differ".into(),
            ));
        }
        self.cache_backend
            .parse::<CacheBackend>()
            .map_err(ConfigError::Validation)?;
        if let Some(processor) = &self.image_key_post_processor {
            processor
                .parse::<KeyPostProcessor>()
                .map_err(ConfigError::Validation)?;
        }
        if self.use_placeholder_service && self.placeholder_image.is_some() {
            return Err(ConfigError::Validation(
                "placeholder_image and use_placeholder_service are mutually exclusive".into(),
            ));
        }
        if self.use_placeholder_service && self.placeholder_service_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "placeholder_service_url must not be empty when use_placeholder_service is set"
                    .into(),
            ));
        }
        for entries in self.rendition_key_sets.values() {
            RenditionKeySet::new(entries.clone())?;
        }
        Ok(())
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_ttl: Duration,
    pub cache_backend: CacheBackend,
    pub codec: PathCodec,
    pub create_on_demand: bool,
    pub placeholder: PlaceholderPolicy,
    pub key_sets: BTreeMap<String, RenditionKeySet>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_LENGTH),
            cache_backend: CacheBackend::Memory,
            codec: PathCodec::default(),
            create_on_demand: true,
            placeholder: PlaceholderPolicy::None,
            key_sets: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Validate `config` and convert it into runtime settings.
    pub fn from_config(config: &RenditionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache_backend = config
            .cache_backend
            .parse()
            .map_err(ConfigError::Validation)?;
        let post_processor = config
            .image_key_post_processor
            .as_deref()
            .map(str::parse::<KeyPostProcessor>)
            .transpose()
            .map_err(ConfigError::Validation)?;

        let placeholder = match (&config.placeholder_image, config.use_placeholder_service) {
            (Some(path), _) => PlaceholderPolicy::Image(PlaceholderImage::OnDisk(path.clone())),
            (None, true) => PlaceholderPolicy::Service {
                base_url: config.placeholder_service_url.clone(),
            },
            (None, false) => PlaceholderPolicy::None,
        };

        let key_sets = config
            .rendition_key_sets
            .iter()
            .map(|(name, entries)| {
                RenditionKeySet::new(entries.clone()).map(|set| (name.clone(), set))
            })
            .collect::<Result<BTreeMap<_, _>, KeySetError>>()?;

        Ok(Self {
            cache_ttl: Duration::from_secs(config.cache_length),
            cache_backend,
            codec: PathCodec {
                sized_dir: config.sized_directory_name.clone(),
                filtered_dir: config.filtered_directory_name.clone(),
                placeholder_dir: config.placeholder_directory_name.clone(),
                jpeg_quality: Quality::new(config.jpeg_resize_quality),
                post_processor,
            },
            create_on_demand: config.create_images_on_demand,
            placeholder,
            key_sets,
        })
    }

    /// Look up a named rendition key set.
    pub fn key_set(&self, name: &str) -> Result<&RenditionKeySet, KeySetError> {
        self.key_sets
            .get(name)
            .ok_or_else(|| KeySetError::UnknownKeySet(name.to_string()))
    }
}

// =============================================================================
// Config loading
// =============================================================================

/// Parse and validate a config file at `path`.
///
/// A relative `placeholder_image` is resolved against the file's directory.
pub fn load_config_file(path: &Path) -> Result<RenditionConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: RenditionConfig = toml::from_str(&content)?;
    if let (Some(image), Some(dir)) = (&config.placeholder_image, path.parent()) {
        if image.is_relative() {
            config.placeholder_image = Some(dir.join(image));
        }
    }
    config.validate()?;
    Ok(config)
}

/// Load `config.toml` from the given directory, or the defaults if there is
/// no such file.
pub fn load_config(root: &Path) -> Result<RenditionConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(RenditionConfig::default());
    }
    load_config_file(&config_path)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Renditions Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Existence cache
# ---------------------------------------------------------------------------
# How long (seconds) a created rendition is remembered as existing.
cache_length = 2592000

# Where that knowledge lives:
#   "memory"   - in-process only
#   "manifest" - a JSON file in the storage root, shared between runs
#   "none"     - always ask storage
cache_backend = "memory"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
# JPEG encoding quality (1 = worst, 100 = best). Part of JPEG rendition
# filenames, so changing it produces fresh renditions.
jpeg_resize_quality = 70

# Directory names for created files.
sized_directory_name = "__sized__"
filtered_directory_name = "__filtered__"
placeholder_directory_name = "__placeholder__"

# Create renditions the first time they're requested. When false, URLs are
# computed without touching storage and renditions must be pre-created.
create_images_on_demand = true

# Hash the size part of sized filenames: "sha256" or "sha256_16".
# image_key_post_processor = "sha256_16"

# ---------------------------------------------------------------------------
# Placeholders (pick at most one)
# ---------------------------------------------------------------------------
# Serve sized URLs from an external placeholder service for missing images.
use_placeholder_service = false
placeholder_service_url = "http://placehold.it"

# Or derive renditions from a local placeholder image.
# placeholder_image = "assets/placeholder.png"

# ---------------------------------------------------------------------------
# Rendition key sets
# ---------------------------------------------------------------------------
# Named groups of [label, image key] pairs, resolved together by `url-set`.
[rendition_key_sets]
# gallery = [["full", "url"], ["thumb", "crop__200x200"], ["inverted", "filters__invert__url"]]
"##
}
