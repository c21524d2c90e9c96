//! Deleting the renditions of a source.
//!
//! Nothing records which renditions were created. Instead, the deletion
//! patterns are rebuilt from the registered transform names and matched
//! against the listing of each rendition directory. For a source
//! `photos/cat.jpg` a file is a candidate if it is `cat{tag}.jpg`, and is
//! deleted if `{tag}` matches. The stem and extension are split exactly as
//! [`crate::naming`] splits them, so `scans/page` matches `page{tag}.jpg`.
//!
//! | Directory | Tag pattern |
//! |---|---|
//! | `photos/__filtered__` | `__{filter}__` |
//! | `__sized__/photos` | `-{sizer key}-{W}x{H}[-{q}]` |
//! | `__sized__/photos/__filtered__` | `__{filter}__-{sizer key}-{W}x{H}[-{q}]` |
//!
//! With a key post-processor configured, a hashed sized tag (`-{hex}`) is
//! recognised too. Anything else in those directories is left alone, and a
//! directory that doesn't exist means there is nothing to delete.

use crate::cache::ExistenceCache;
use crate::naming::{KeyPostProcessor, split_extension};
use crate::registry::TransformRegistry;
use crate::storage::{Storage, StorageError};
use regex::Regex;

/// Compiled tag patterns for the three rendition directories.
///
/// A pattern is `None` when no transform of the needed kind is registered,
/// in which case nothing in that directory is ever deleted.
#[derive(Debug, Clone)]
pub struct DeletionPatterns {
    filter: Option<Regex>,
    sizer: Option<Regex>,
    filter_and_sizer: Option<Regex>,
}

impl DeletionPatterns {
    pub fn new(
        registry: &TransformRegistry,
        post_processor: Option<KeyPostProcessor>,
    ) -> Result<Self, regex::Error> {
        let filters: Vec<String> = registry.filter_names().map(regex::escape).collect();
        let sizers: Vec<String> = registry
            .sizers()
            .map(|(_, sizer)| sizer.filename_key_regex())
            .collect();

        let filter_snippet =
            (!filters.is_empty()).then(|| format!("__(?:{})__", filters.join("|")));

        let mut sizer_alternatives = Vec::new();
        if !sizers.is_empty() {
            sizer_alternatives.push(format!(r"-(?:{})-\d+x\d+(?:-\d+)?", sizers.join("|")));
        }
        if let Some(processor) = post_processor {
            sizer_alternatives.push(format!("-[0-9a-f]{{{}}}", processor.output_len()));
        }
        let sizer_snippet = (!sizer_alternatives.is_empty())
            .then(|| format!("(?:{})", sizer_alternatives.join("|")));

        let compile = |snippet: Option<String>| -> Result<Option<Regex>, regex::Error> {
            snippet.map(|s| Regex::new(&format!("^{s}$"))).transpose()
        };
        let filter_and_sizer = match (&filter_snippet, &sizer_snippet) {
            (Some(f), Some(s)) => Some(format!("{f}{s}")),
            _ => None,
        };

        Ok(Self {
            filter: compile(filter_snippet)?,
            sizer: compile(sizer_snippet)?,
            filter_and_sizer: compile(filter_and_sizer)?,
        })
    }

    pub fn filter(&self) -> Option<&Regex> {
        self.filter.as_ref()
    }

    pub fn sizer(&self) -> Option<&Regex> {
        self.sizer.as_ref()
    }

    pub fn filter_and_sizer(&self) -> Option<&Regex> {
        self.filter_and_sizer.as_ref()
    }
}

/// The `(stem, .ext)` every rendition file name of `source` starts and ends
/// with.
fn rendition_affixes(source: &str) -> (String, String) {
    let filename = source.rsplit('/').next().unwrap_or(source);
    let (stem, ext) = split_extension(filename);
    (stem.replace(' ', ""), format!(".{ext}"))
}

/// Delete every file in `root_folder` derived from `source` whose tag matches
/// `pattern`, evicting each from the existence cache. Returns the deleted
/// paths.
pub fn delete_matching_files(
    storage: &dyn Storage,
    cache: &dyn ExistenceCache,
    source: &str,
    root_folder: &str,
    pattern: Option<&Regex>,
) -> Result<Vec<String>, StorageError> {
    let Some(pattern) = pattern else {
        return Ok(Vec::new());
    };
    let files = match storage.listdir(root_folder) {
        Ok((_, files)) => files,
        Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let (stem, ext) = rendition_affixes(source);

    let mut deleted = Vec::new();
    for file in files {
        if file.len() < stem.len() + ext.len() || !file.starts_with(&stem) || !file.ends_with(&ext)
        {
            continue;
        }
        let tag = &file[stem.len()..file.len() - ext.len()];
        if !pattern.is_match(tag) {
            continue;
        }
        let location = if root_folder.is_empty() {
            file.clone()
        } else {
            format!("{}/{file}", root_folder.trim_end_matches('/'))
        };
        storage.delete(&location)?;
        cache.delete(&storage.url(&location));
        tracing::info!("Deleted {location} (created from: {source})");
        deleted.push(location);
    }
    Ok(deleted)
}
