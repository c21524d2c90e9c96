//! Image keys and rendition key sets.
//!
//! An image key is a compact, string form of "which rendition of this image":
//!
//! | Key | Rendition |
//! |---|---|
//! | `url` | the source image itself |
//! | `crop__400x400` | sizer `crop` at 400x400 |
//! | `filters__invert__url` | filter `invert` |
//! | `filters__invert__thumbnail__100x100` | `invert`, then `thumbnail` at 100x100 |
//!
//! A rendition key set names a group of these, e.g. all the sizes a page
//! template needs, so a single call can resolve them into URLs.

use crate::processed::RenditionError;
use crate::sized::parse_size_key;
use std::collections::HashSet;
use thiserror::Error;

const SEPARATOR: &str = "__";
const ORIGINAL: &str = "url";
const FILTERS: &str = "filters";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeySetError {
    #[error(
        "'{0}' is an invalid size. All sizes must be either 'url' or made up of at least \
         two segments separated by double underscores. Examples: 'crop__400x400', \
         'filters__invert__url'"
    )]
    InvalidSizeKey(String),
    #[error("No rendition key set named '{0}'")]
    UnknownKeySet(String),
}

/// A parsed image key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageKey {
    Original,
    Sized {
        sizer: String,
        width: u32,
        height: u32,
    },
    Filtered {
        filter: String,
    },
    FilteredSized {
        filter: String,
        sizer: String,
        width: u32,
        height: u32,
    },
}

impl ImageKey {
    pub fn parse(key: &str) -> Result<Self, RenditionError> {
        let invalid = || RenditionError::InvalidImageKey(key.to_string());
        let mut segments: Vec<&str> = key.split(SEPARATOR).collect();

        // A trailing segment containing `x` is a size; everything before it
        // names the transform chain.
        let size = match segments.last() {
            Some(last) if last.contains('x') => {
                let size = parse_size_key(last)?;
                segments.pop();
                Some(size)
            }
            _ => None,
        };

        match (segments.as_slice(), size) {
            ([ORIGINAL], None) => Ok(ImageKey::Original),
            ([FILTERS, filter, ORIGINAL], None) => Ok(ImageKey::Filtered {
                filter: filter.to_string(),
            }),
            ([FILTERS, filter, sizer], Some((width, height))) => Ok(ImageKey::FilteredSized {
                filter: filter.to_string(),
                sizer: sizer.to_string(),
                width,
                height,
            }),
            ([sizer], Some((width, height))) if *sizer != FILTERS && *sizer != ORIGINAL => {
                Ok(ImageKey::Sized {
                    sizer: sizer.to_string(),
                    width,
                    height,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// A validated list of `(label, image key)` pairs with duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenditionKeySet {
    entries: Vec<(String, String)>,
}

impl RenditionKeySet {
    /// Check the shape of every key (last segment is `url` or a size) and
    /// drop exact duplicates, keeping first occurrences in order.
    pub fn new(entries: Vec<(String, String)>) -> Result<Self, KeySetError> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(entries.len());
        for (label, key) in entries {
            let last = key.rsplit(SEPARATOR).next().unwrap_or_default();
            if last != ORIGINAL && !last.contains('x') {
                return Err(KeySetError::InvalidSizeKey(key));
            }
            if seen.insert((label.clone(), key.clone())) {
                kept.push((label, key));
            }
        }
        Ok(Self { entries: kept })
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn parse_original() {
        assert_eq!(ImageKey::parse("url").unwrap(), ImageKey::Original);
    }

    #[test]
    fn parse_sized() {
        assert_eq!(
            ImageKey::parse("crop__400x300").unwrap(),
            ImageKey::Sized {
                sizer: "crop".into(),
                width: 400,
                height: 300
            }
        );
    }

    #[test]
    fn parse_filtered() {
        assert_eq!(
            ImageKey::parse("filters__invert__url").unwrap(),
            ImageKey::Filtered {
                filter: "invert".into()
            }
        );
    }

    #[test]
    fn parse_filtered_sized() {
        assert_eq!(
            ImageKey::parse("filters__invert__thumbnail__100x100").unwrap(),
            ImageKey::FilteredSized {
                filter: "invert".into(),
                sizer: "thumbnail".into(),
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn malformed_size_is_malformed_key() {
        assert!(matches!(
            ImageKey::parse("crop__fooxbar"),
            Err(RenditionError::MalformedKey(_))
        ));
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        for key in ["", "crop", "filters__url", "a__b__c__10x10", "url__10x10", "filters__10x10"] {
            assert!(
                matches!(ImageKey::parse(key), Err(RenditionError::InvalidImageKey(_))),
                "{key} should be invalid"
            );
        }
    }

    #[test]
    fn key_set_removes_duplicates_in_order() {
        let set = RenditionKeySet::new(pairs(&[
            ("large", "url"),
            ("small", "crop__100x100"),
            ("large", "url"),
        ]))
        .unwrap();
        assert_eq!(
            set.entries(),
            pairs(&[("large", "url"), ("small", "crop__100x100")]).as_slice()
        );
    }

    #[test]
    fn key_set_rejects_keys_without_size_or_url() {
        let err = RenditionKeySet::new(pairs(&[("bad", "crop__large")])).unwrap_err();
        assert_eq!(err, KeySetError::InvalidSizeKey("crop__large".into()));
    }
}
