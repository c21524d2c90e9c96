//! What to derive renditions from when an image has no source.
//!
//! Two strategies exist and a deployment picks at most one:
//!
//! - **Local image**: a placeholder file is copied once onto the bound
//!   storage under the placeholder directory, then treated exactly like a
//!   real source (sized, filtered, cached).
//! - **External service**: sized renditions become URLs on a third-party
//!   placeholder service. Nothing touches storage or the existence cache.

use crate::imaging::ImageFormatTag;
use crate::storage::{Storage, StorageError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_PLACEHOLDER_SERVICE_URL: &str = "http://placehold.it";

/// Where the bytes of a local placeholder image come from.
#[derive(Clone)]
pub enum PlaceholderImage {
    OnDisk(PathBuf),
    OnStorage {
        storage: Arc<dyn Storage>,
        path: String,
    },
}

impl PlaceholderImage {
    /// File name the placeholder is stored under on a bound storage.
    pub fn file_name(&self) -> String {
        match self {
            PlaceholderImage::OnDisk(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            PlaceholderImage::OnStorage { path, .. } => {
                path.rsplit('/').next().unwrap_or_default().to_string()
            }
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, StorageError> {
        match self {
            PlaceholderImage::OnDisk(path) => Ok(std::fs::read(path)?),
            PlaceholderImage::OnStorage { storage, path } => storage.open(path),
        }
    }

    /// Copy the placeholder to `target` on `storage` unless it is already there.
    /// Returns whether a copy was made.
    pub fn install(&self, storage: &dyn Storage, target: &str) -> Result<bool, StorageError> {
        if storage.exists(target)? {
            return Ok(false);
        }
        let content_type = ImageFormatTag::from_path(target).mime_type();
        storage.save(target, &self.read()?, content_type)?;
        tracing::info!(path = target, "installed placeholder image");
        Ok(true)
    }
}

impl fmt::Debug for PlaceholderImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderImage::OnDisk(path) => f.debug_tuple("OnDisk").field(path).finish(),
            PlaceholderImage::OnStorage { path, .. } => {
                f.debug_struct("OnStorage").field("path", path).finish_non_exhaustive()
            }
        }
    }
}

/// Placeholder strategy for images without a source.
#[derive(Debug, Clone, Default)]
pub enum PlaceholderPolicy {
    /// No placeholder; requesting a rendition fails with a missing-source error.
    #[default]
    None,
    Image(PlaceholderImage),
    Service { base_url: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageOp};
    use tempfile::TempDir;

    #[test]
    fn file_name_from_disk_path() {
        let ph = PlaceholderImage::OnDisk(PathBuf::from("/assets/img/placeholder.png"));
        assert_eq!(ph.file_name(), "placeholder.png");
    }

    #[test]
    fn file_name_from_storage_path() {
        let ph = PlaceholderImage::OnStorage {
            storage: Arc::new(MemoryStorage::new("/static")),
            path: "defaults/blank.gif".into(),
        };
        assert_eq!(ph.file_name(), "blank.gif");
    }

    #[test]
    fn install_copies_once() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("ph.png");
        std::fs::write(&file, b"png-bytes").unwrap();
        let ph = PlaceholderImage::OnDisk(file);
        let storage = MemoryStorage::new("/media");

        assert!(ph.install(&storage, "__placeholder__/ph.png").unwrap());
        assert!(!ph.install(&storage, "__placeholder__/ph.png").unwrap());
        assert_eq!(storage.get("__placeholder__/ph.png").unwrap(), b"png-bytes");
        assert_eq!(
            storage.content_type("__placeholder__/ph.png").as_deref(),
            Some("image/png")
        );
        assert_eq!(storage.saved_paths(), vec!["__placeholder__/ph.png".to_string()]);
        assert!(storage
            .operations()
            .contains(&StorageOp::Exists("__placeholder__/ph.png".into())));
    }

    #[test]
    fn install_from_missing_file_fails() {
        let ph = PlaceholderImage::OnDisk(PathBuf::from("/definitely/not/here.png"));
        let storage = MemoryStorage::new("/media");
        assert!(ph.install(&storage, "__placeholder__/here.png").is_err());
    }
}
