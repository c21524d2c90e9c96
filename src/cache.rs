//! Existence cache for created renditions.
//!
//! Checking storage for a rendition on every request is the expensive part of
//! serving an already-created image (a network round trip on object stores).
//! This cache remembers "this URL is known to exist" so repeated requests can
//! skip both the `exists` check and any re-creation attempt.
//!
//! # Design
//!
//! The cache is **advisory**. Storage is always the source of truth: losing
//! an entry costs one extra `exists` check (or, in a race, one redundant and
//! byte-identical re-creation) but never produces wrong output. There is no
//! locking around the check-then-create sequence for the same reason.
//!
//! ## Keys and values
//!
//! Keys are the public URLs of renditions. Values are a sentinel; only their
//! presence matters. Entries expire after the configured TTL (30 days by
//! default).
//!
//! ## Backends
//!
//! - [`MemoryCache`]: process-local map with per-entry expiry.
//! - [`ManifestCache`]: a JSON manifest on disk, so short-lived processes
//!   (the CLI) share knowledge between runs.
//! - [`NullCache`]: never remembers anything; every request checks storage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Sentinel stored for renditions known to exist.
pub const EXISTS: &str = "1";

/// Best-effort key/value cache with TTLs.
///
/// Operations are infallible from the caller's point of view: a backend that
/// cannot reach its store behaves like a miss.
pub trait ExistenceCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, ttl: Duration);

    fn delete(&self, key: &str);
}

/// Cache backends selectable by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Manifest,
    None,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(CacheBackend::Memory),
            "manifest" => Ok(CacheBackend::Manifest),
            "none" => Ok(CacheBackend::None),
            other => Err(format!(
                "unknown cache backend '{other}' (expected memory, manifest or none)"
            )),
        }
    }
}

// =========================================================================
// MemoryCache
// =========================================================================

/// Expiry of a memory cache entry; `None` when the TTL reaches past what
/// `Instant` can represent, which means the entry never expires.
type Expiry = Option<Instant>;

fn is_live(expires: Expiry, now: Instant) -> bool {
    expires.is_none_or(|at| at > now)
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Expiry)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .values()
            .filter(|(_, expires)| is_live(*expires, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Expiry)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExistenceCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((value, expires)) if is_live(*expires, Instant::now()) => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expires = Instant::now().checked_add(ttl);
        self.entries()
            .insert(key.to_string(), (value.to_string(), expires));
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

// =========================================================================
// NullCache
// =========================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl ExistenceCache for NullCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    fn delete(&self, _key: &str) {}
}

// =========================================================================
// ManifestCache
// =========================================================================

/// Name of the cache manifest file.
pub const MANIFEST_FILENAME: &str = ".rendition-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing manifests when the format changes.
const MANIFEST_VERSION: u32 = 1;

/// A single remembered key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub value: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// Existence cache persisted as a JSON manifest.
///
/// The manifest is rewritten after every change. Write failures are logged
/// and otherwise ignored; the in-memory view stays authoritative for the
/// lifetime of the process.
#[derive(Debug)]
pub struct ManifestCache {
    path: PathBuf,
    manifest: Mutex<Manifest>,
}

impl ManifestCache {
    /// Load the manifest at `path`. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let manifest = read_manifest(&path).unwrap_or_else(Manifest::empty);
        Self {
            path,
            manifest: Mutex::new(manifest),
        }
    }

    /// Load the manifest that lives in `dir` under the default file name.
    pub fn in_dir(dir: &Path) -> Self {
        Self::load(dir.join(MANIFEST_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn manifest(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, manifest: &Manifest) {
        let result = serde_json::to_string_pretty(manifest)
            .map_err(std::io::Error::from)
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(e) = result {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to write cache manifest"
            );
        }
    }
}

fn read_manifest(path: &Path) -> Option<Manifest> {
    let content = std::fs::read_to_string(path).ok()?;
    let manifest: Manifest = serde_json::from_str(&content).ok()?;
    (manifest.version == MANIFEST_VERSION).then_some(manifest)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl ExistenceCache for ManifestCache {
    fn get(&self, key: &str) -> Option<String> {
        let manifest = self.manifest();
        manifest
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > unix_now())
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut manifest = self.manifest();
        let now = unix_now();
        manifest.entries.retain(|_, entry| entry.expires_at > now);
        manifest.entries.insert(
            key.to_string(),
            ManifestEntry {
                value: value.to_string(),
                expires_at: now.saturating_add(ttl.as_secs()),
            },
        );
        self.persist(&manifest);
    }

    fn delete(&self, key: &str) {
        let mut manifest = self.manifest();
        if manifest.entries.remove(key).is_some() {
            self.persist(&manifest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LONG: Duration = Duration::from_secs(3600);

    #[test]
    fn backend_names() {
        assert_eq!("memory".parse(), Ok(CacheBackend::Memory));
        assert_eq!("manifest".parse(), Ok(CacheBackend::Manifest));
        assert_eq!("none".parse(), Ok(CacheBackend::None));
        assert!("redis".parse::<CacheBackend>().is_err());
    }

    // =========================================================================
    // MemoryCache
    // =========================================================================

    #[test]
    fn memory_set_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("/media/a.jpg"), None);
        cache.set("/media/a.jpg", EXISTS, LONG);
        assert_eq!(cache.get("/media/a.jpg").as_deref(), Some(EXISTS));
        assert_eq!(cache.len(), 1);
        cache.delete("/media/a.jpg");
        assert_eq!(cache.get("/media/a.jpg"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn memory_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", EXISTS, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn memory_unrepresentable_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", EXISTS, Duration::from_secs(u64::MAX));
        assert_eq!(cache.get("k").as_deref(), Some(EXISTS));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn manifest_saturates_huge_ttl() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::in_dir(tmp.path());
        cache.set("k", EXISTS, Duration::from_secs(u64::MAX));
        assert_eq!(cache.get("k").as_deref(), Some(EXISTS));
    }

    #[test]
    fn null_cache_never_remembers() {
        let cache = NullCache;
        cache.set("k", EXISTS, LONG);
        assert_eq!(cache.get("k"), None);
    }

    // =========================================================================
    // ManifestCache
    // =========================================================================

    #[test]
    fn manifest_persists_between_loads() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::in_dir(tmp.path());
        cache.set("/media/a.jpg", EXISTS, LONG);

        let reloaded = ManifestCache::in_dir(tmp.path());
        assert_eq!(reloaded.get("/media/a.jpg").as_deref(), Some(EXISTS));
    }

    #[test]
    fn manifest_delete_persists() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::in_dir(tmp.path());
        cache.set("k", EXISTS, LONG);
        cache.delete("k");

        assert_eq!(ManifestCache::in_dir(tmp.path()).get("k"), None);
    }

    #[test]
    fn manifest_expired_entries_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::in_dir(tmp.path());
        cache.set("k", EXISTS, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn manifest_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::in_dir(tmp.path());
        assert_eq!(cache.get("anything"), None);
    }

    #[test]
    fn manifest_corrupt_json_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "not json").unwrap();
        assert_eq!(ManifestCache::in_dir(tmp.path()).get("k"), None);
    }

    #[test]
    fn manifest_wrong_version_is_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"k": {{"value": "1", "expires_at": {}}}}}}}"#,
            MANIFEST_VERSION + 1,
            u64::MAX
        );
        fs::write(tmp.path().join(MANIFEST_FILENAME), json).unwrap();
        assert_eq!(ManifestCache::in_dir(tmp.path()).get("k"), None);
    }

    #[test]
    fn manifest_unwritable_path_still_serves_from_memory() {
        let tmp = TempDir::new().unwrap();
        let cache = ManifestCache::load(tmp.path().join("missing-dir/cache.json"));
        cache.set("k", EXISTS, LONG);
        assert_eq!(cache.get("k").as_deref(), Some(EXISTS));
    }
}
