//! Deterministic storage paths for renditions.
//!
//! Every rendition lives at a path derived purely from its source path and
//! the transform that produced it, so the engine never needs a manifest of
//! what it created. The same inputs always give the same path.
//!
//! ## Layout
//!
//! | Rendition | Path |
//! |---|---|
//! | sized | `__sized__/{folder}/{name}-{key}-{W}x{H}[-{q}].{ext}` |
//! | filtered | `{folder}/__filtered__/{name}__{filter}__.{ext}` |
//! | filtered + sized | `__sized__/{folder}/__filtered__/{name}__{filter}__-{key}-{W}x{H}.{ext}` |
//! | placeholder copy | `__placeholder__/{file}` |
//!
//! `{key}` is the sizer's filename key, followed by `-c{x}__{y}` for sizers
//! framed by a point of interest. The `-{q}` quality suffix appears only on
//! JPEG renditions so a quality change never collides with stale files.
//! A source without an extension gets `.jpg`. Spaces are stripped from every
//! generated path.
//!
//! The directory names are configurable; see [`crate::config`].

use crate::imaging::Quality;
use crate::ppoi::Ppoi;
use sha2::{Digest, Sha256};
use std::str::FromStr;

pub const DEFAULT_SIZED_DIR: &str = "__sized__";
pub const DEFAULT_FILTERED_DIR: &str = "__filtered__";
pub const DEFAULT_PLACEHOLDER_DIR: &str = "__placeholder__";

/// Extension assumed for sources that don't have one.
const FALLBACK_EXTENSION: &str = "jpg";

/// Optional hashing of the `{key}-{W}x{H}[-{q}]` part of sized filenames.
///
/// Hashed keys give every sized filename the same length and hide the
/// transform parameters from the public URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPostProcessor {
    /// Full SHA-256, 64 hex characters.
    Sha256,
    /// First 16 hex characters of the SHA-256.
    Sha256Short,
}

impl KeyPostProcessor {
    pub fn apply(self, key: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        match self {
            KeyPostProcessor::Sha256 => digest,
            KeyPostProcessor::Sha256Short => digest[..16].to_string(),
        }
    }

    /// Number of hex characters [`apply`](Self::apply) produces.
    pub fn output_len(self) -> usize {
        match self {
            KeyPostProcessor::Sha256 => 64,
            KeyPostProcessor::Sha256Short => 16,
        }
    }
}

impl FromStr for KeyPostProcessor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(KeyPostProcessor::Sha256),
            "sha256_16" => Ok(KeyPostProcessor::Sha256Short),
            other => Err(format!(
                "unknown image key post-processor '{other}' (expected sha256 or sha256_16)"
            )),
        }
    }
}

/// Computes rendition paths. Pure: no storage access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCodec {
    pub sized_dir: String,
    pub filtered_dir: String,
    pub placeholder_dir: String,
    pub jpeg_quality: Quality,
    pub post_processor: Option<KeyPostProcessor>,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self {
            sized_dir: DEFAULT_SIZED_DIR.to_string(),
            filtered_dir: DEFAULT_FILTERED_DIR.to_string(),
            placeholder_dir: DEFAULT_PLACEHOLDER_DIR.to_string(),
            jpeg_quality: Quality::default(),
            post_processor: None,
        }
    }
}

impl PathCodec {
    /// Filename key of a sizer, with the PPOI discriminator appended when
    /// the sizer frames around one: `crop` + (0.25, 0.25) → `crop-c0-25__0-25`.
    pub fn sizer_key(filename_key: &str, ppoi: Option<Ppoi>) -> String {
        match ppoi {
            Some(ppoi) => format!("{filename_key}-{}", ppoi.discriminator()),
            None => filename_key.to_string(),
        }
    }

    /// `photo.jpg` + `crop` + 100x100 → `photo-crop-100x100-70.jpg`.
    pub fn sized_filename(&self, filename: &str, key: &str, width: u32, height: u32) -> String {
        let (name, ext) = split_extension(filename);
        let mut resized_key = format!("{key}-{width}x{height}");
        if is_jpeg_extension(ext) {
            resized_key.push_str(&format!("-{}", self.jpeg_quality.value()));
        }
        let resized_key = match self.post_processor {
            Some(processor) => processor.apply(&resized_key),
            None => resized_key,
        };
        format!("{name}-{resized_key}.{ext}")
    }

    pub fn sized_path(&self, source: &str, key: &str, width: u32, height: u32) -> String {
        let (folder, filename) = split_folder(source);
        let filename = self.sized_filename(filename, key, width, height);
        join_path(&[&self.sized_dir, folder, &filename])
    }

    /// `photo.gif` + `invert` → `photo__invert__.gif`.
    pub fn filtered_filename(&self, filename: &str, filter: &str) -> String {
        let (name, ext) = split_extension(filename);
        format!("{name}__{filter}__.{ext}")
    }

    pub fn filtered_path(&self, source: &str, filter: &str) -> String {
        let (folder, filename) = split_folder(source);
        let filename = self.filtered_filename(filename, filter);
        join_path(&[folder, &self.filtered_dir, &filename])
    }

    /// Where a local placeholder image is copied to on a bound storage.
    pub fn placeholder_path(&self, file_name: &str) -> String {
        join_path(&[&self.placeholder_dir, file_name])
    }

    /// Directory holding the sized renditions of `source`.
    pub fn sized_root_folder(&self, source: &str) -> String {
        let (folder, _) = split_folder(source);
        join_path(&[&self.sized_dir, folder])
    }

    /// Directory holding the filtered renditions of `source`.
    pub fn filtered_root_folder(&self, source: &str) -> String {
        let (folder, _) = split_folder(source);
        join_path(&[folder, &self.filtered_dir])
    }

    /// Directory holding sized renditions of the filtered renditions of `source`.
    pub fn filtered_sized_root_folder(&self, source: &str) -> String {
        let (folder, _) = split_folder(source);
        join_path(&[&self.sized_dir, folder, &self.filtered_dir])
    }
}

/// URL of an external placeholder service image: `{base}/{W}x{H}`.
pub fn placeholder_service_url(base_url: &str, width: u32, height: u32) -> String {
    format!("{}/{width}x{height}", base_url.trim_end_matches('/'))
}

/// Split `a/b/photo.jpg` into (`a/b`, `photo.jpg`).
pub fn split_folder(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

/// Split `photo.jpg` into (`photo`, `jpg`); no extension gives `jpg`.
pub fn split_extension(filename: &str) -> (&str, &str) {
    filename
        .rsplit_once('.')
        .unwrap_or((filename, FALLBACK_EXTENSION))
}

fn is_jpeg_extension(ext: &str) -> bool {
    ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
}

/// Join non-empty segments with `/` and strip spaces.
fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
        .replace(' ', "")
}
