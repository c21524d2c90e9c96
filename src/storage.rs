//! Storage backends renditions are read from and written to.
//!
//! The [`Storage`] trait is the only way the engine touches persisted bytes.
//! Paths are `/`-separated and relative to the backend's root; a backend is
//! also responsible for turning a path into its public URL.
//!
//! Two implementations ship with the crate:
//!
//! - [`FileSystemStorage`]: a directory on local disk served under a base URL.
//!   Writes go to a uniquely named temporary sibling first and are renamed
//!   into place, so a reader never sees a half-written rendition and
//!   concurrent writers of the same path don't trip over each other's
//!   temporary files. The last rename wins.
//! - [`MemoryStorage`]: an in-process map that also records every operation,
//!   used by tests to assert what the engine did (or did not) touch.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Byte storage with public URLs.
pub trait Storage: Send + Sync {
    /// Read the full contents at `path`.
    fn open(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `content` to `path`, replacing anything already there.
    /// `content_type` is the MIME type of the bytes, for backends that
    /// store one.
    fn save(&self, path: &str, content: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// List the immediate children of a directory as `(directories, files)`.
    ///
    /// Fails with [`StorageError::NotFound`] if the directory doesn't exist.
    fn listdir(&self, path: &str) -> Result<(Vec<String>, Vec<String>), StorageError>;

    /// Public URL for `path`.
    fn url(&self, path: &str) -> String;
}

/// Join a base URL and a storage path with exactly one `/` between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// =========================================================================
// FileSystemStorage
// =========================================================================

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

fn not_found_or_io(path: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

impl Storage for FileSystemStorage {
    fn open(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.full_path(path)).map_err(|e| not_found_or_io(path, e))
    }

    /// Files carry no content type; it is implied by the extension.
    fn save(&self, path: &str, content: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let target = self.full_path(path);
        let parent = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.full_path(path).exists())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn listdir(&self, path: &str) -> Result<(Vec<String>, Vec<String>), StorageError> {
        let entries = fs::read_dir(self.full_path(path)).map_err(|e| not_found_or_io(path, e))?;
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        dirs.sort();
        files.sort();
        Ok((dirs, files))
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

// =========================================================================
// MemoryStorage
// =========================================================================

/// An operation performed against a [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Open(String),
    Save(String),
    Exists(String),
    Delete(String),
    Listdir(String),
}

/// In-process storage that records every operation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    base_url: String,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    content_types: Mutex<BTreeMap<String, String>>,
    operations: Mutex<Vec<StorageOp>>,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Store bytes without recording an operation (fixture setup).
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.files().insert(normalize(path), content.into());
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files().keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files().get(&normalize(path)).cloned()
    }

    /// Content type the file at `path` was last saved with.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.content_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(path))
            .cloned()
    }

    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Paths passed to `save`, in call order.
    pub fn saved_paths(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::Save(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn clear_operations(&self) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: StorageOp) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl Storage for MemoryStorage {
    fn open(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.record(StorageOp::Open(path.to_string()));
        self.files()
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn save(&self, path: &str, content: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.record(StorageOp::Save(path.to_string()));
        self.files().insert(normalize(path), content.to_vec());
        self.content_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(path), content_type.to_string());
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.record(StorageOp::Exists(path.to_string()));
        Ok(self.files().contains_key(&normalize(path)))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.record(StorageOp::Delete(path.to_string()));
        self.files().remove(&normalize(path));
        self.content_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(path));
        Ok(())
    }

    fn listdir(&self, path: &str) -> Result<(Vec<String>, Vec<String>), StorageError> {
        self.record(StorageOp::Listdir(path.to_string()));
        let dir = normalize(path);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let files = self.files();
        let mut dirs = BTreeSet::new();
        let mut names = BTreeSet::new();
        let mut found = dir.is_empty();
        for key in files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            found = true;
            match rest.split_once('/') {
                Some((child_dir, _)) => {
                    dirs.insert(child_dir.to_string());
                }
                None => {
                    names.insert(rest.to_string());
                }
            }
        }
        if !found {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok((dirs.into_iter().collect(), names.into_iter().collect()))
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("/media/", "/a/b.jpg"), "/media/a/b.jpg");
        assert_eq!(join_url("https://cdn.example", "a.jpg"), "https://cdn.example/a.jpg");
    }

    // =========================================================================
    // FileSystemStorage
    // =========================================================================

    #[test]
    fn fs_save_open_exists_delete() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path(), "/media");

        assert!(!storage.exists("a/b/c.jpg").unwrap());
        storage.save("a/b/c.jpg", b"bytes", "image/jpeg").unwrap();
        assert!(storage.exists("a/b/c.jpg").unwrap());
        assert_eq!(storage.open("a/b/c.jpg").unwrap(), b"bytes");
        // No temporary file is left next to the target
        let (_, files) = storage.listdir("a/b").unwrap();
        assert_eq!(files, vec!["c.jpg"]);

        storage.delete("a/b/c.jpg").unwrap();
        assert!(!storage.exists("a/b/c.jpg").unwrap());
        // Deleting again is a no-op
        storage.delete("a/b/c.jpg").unwrap();
    }

    #[test]
    fn fs_concurrent_saves_of_one_path_all_succeed() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(FileSystemStorage::new(tmp.path(), "/media"));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    storage.save("__sized__/a-crop-10x10.png", b"same bytes", "image/png")
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(storage.open("__sized__/a-crop-10x10.png").unwrap(), b"same bytes");
        let (_, files) = storage.listdir("__sized__").unwrap();
        assert_eq!(files, vec!["a-crop-10x10.png"]);
    }

    #[test]
    fn fs_open_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path(), "/media");
        assert!(matches!(storage.open("nope.jpg"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn fs_listdir_splits_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path(), "/media");
        storage.save("root/x.jpg", b"1", "image/jpeg").unwrap();
        storage.save("root/sub/y.jpg", b"2", "image/jpeg").unwrap();

        let (dirs, files) = storage.listdir("root").unwrap();
        assert_eq!(dirs, vec!["sub"]);
        assert_eq!(files, vec!["x.jpg"]);
        assert!(matches!(storage.listdir("missing"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn fs_url_uses_base() {
        let storage = FileSystemStorage::new("/srv/media", "https://cdn.example/media/");
        assert_eq!(
            storage.url("__sized__/a.jpg"),
            "https://cdn.example/media/__sized__/a.jpg"
        );
    }

    // =========================================================================
    // MemoryStorage
    // =========================================================================

    #[test]
    fn memory_records_operations() {
        let storage = MemoryStorage::new("/media");
        storage.save("a.jpg", b"x", "image/jpeg").unwrap();
        storage.exists("a.jpg").unwrap();
        storage.open("a.jpg").unwrap();

        assert_eq!(
            storage.operations(),
            vec![
                StorageOp::Save("a.jpg".into()),
                StorageOp::Exists("a.jpg".into()),
                StorageOp::Open("a.jpg".into()),
            ]
        );
        assert_eq!(storage.saved_paths(), vec!["a.jpg"]);
        assert_eq!(storage.content_type("a.jpg").as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn memory_insert_is_not_recorded() {
        let storage = MemoryStorage::new("/media");
        storage.insert("photo.jpg", b"x".to_vec());
        assert!(storage.operations().is_empty());
        assert_eq!(storage.paths(), vec!["photo.jpg"]);
    }

    #[test]
    fn memory_listdir() {
        let storage = MemoryStorage::new("/media");
        storage.insert("__sized__/a-crop-10x10.jpg", b"1".to_vec());
        storage.insert("__sized__/__filtered__/a__invert__-crop-10x10.jpg", b"2".to_vec());
        storage.insert("a.jpg", b"3".to_vec());

        let (dirs, files) = storage.listdir("__sized__").unwrap();
        assert_eq!(dirs, vec!["__filtered__"]);
        assert_eq!(files, vec!["a-crop-10x10.jpg"]);

        let (root_dirs, root_files) = storage.listdir("").unwrap();
        assert_eq!(root_dirs, vec!["__sized__"]);
        assert_eq!(root_files, vec!["a.jpg"]);

        assert!(matches!(storage.listdir("__filtered__"), Err(StorageError::NotFound(_))));
    }
}
