//! Registry of named transforms.
//!
//! Sizers and filters live in two independent namespaces: `crop` can be
//! both a sizer and a filter without conflict. Names become path segments
//! and image-key segments, so they are restricted to identifiers that can't
//! be confused with the binder's own keys or with the `__` key separator.
//!
//! ## Discovery
//!
//! Transforms are contributed by [`TransformPlugin`]s, loaded once at start
//! up with [`TransformRegistry::discover`]. Each plugin runs inside a
//! snapshot: if it fails halfway, every registration it made is rolled
//! back before the error is reported. A plugin that simply has nothing to
//! offer ([`PluginError::NoTransforms`]) is skipped without error.

use crate::filtered::Filter;
use crate::sized::Sizer;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Names the binder uses for its own keys.
const RESERVED_NAMES: &[&str] = &["filters", "url", "name", "path", "storage", "ppoi", "sizers"];

/// Which namespace a transform belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Sizer,
    Filter,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Sizer => f.write_str("sizer"),
            TransformKind::Filter => f.write_str("filter"),
        }
    }
}

/// A transform implementation handed to the registry.
#[derive(Clone)]
pub enum Transform {
    Sizer(Arc<dyn Sizer>),
    Filter(Arc<dyn Filter>),
}

impl Transform {
    pub fn sizer(sizer: impl Sizer + 'static) -> Self {
        Transform::Sizer(Arc::new(sizer))
    }

    pub fn filter(filter: impl Filter + 'static) -> Self {
        Transform::Filter(Arc::new(filter))
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::Sizer(_) => TransformKind::Sizer,
            Transform::Filter(_) => TransformKind::Filter,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{name}' is a {found}, it can't be registered as a {expected}")]
    InvalidSubclass {
        name: String,
        expected: TransformKind,
        found: TransformKind,
    },
    #[error("'{name}' is not an allowed {kind} name: {reason}")]
    UnallowedName {
        kind: TransformKind,
        name: String,
        reason: &'static str,
    },
    #[error("A {kind} is already registered as '{name}'")]
    AlreadyRegistered { kind: TransformKind, name: String },
    #[error("No {kind} is registered as '{name}'")]
    NotRegistered { kind: TransformKind, name: String },
}

/// Failure of a single plugin during discovery.
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin has no transforms to contribute; not an error for discovery.
    #[error("plugin provides no transforms")]
    NoTransforms,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
#[error("Failed to load transforms from '{plugin}': {source}")]
pub struct DiscoveryError {
    pub plugin: String,
    #[source]
    pub source: PluginError,
}

/// A bundle of transforms that registers itself.
pub trait TransformPlugin {
    fn name(&self) -> &str;

    fn register(&self, registry: &mut TransformRegistry) -> Result<(), PluginError>;
}

/// Named sizers and filters.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    sizers: BTreeMap<String, Arc<dyn Sizer>>,
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("sizers", &self.sizers.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sizer(
        &mut self,
        name: &str,
        transform: Transform,
    ) -> Result<(), RegistryError> {
        let sizer = match transform {
            Transform::Sizer(sizer) => sizer,
            other => {
                return Err(RegistryError::InvalidSubclass {
                    name: name.to_string(),
                    expected: TransformKind::Sizer,
                    found: other.kind(),
                });
            }
        };
        validate_name(TransformKind::Sizer, name)?;
        if self.sizers.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: TransformKind::Sizer,
                name: name.to_string(),
            });
        }
        self.sizers.insert(name.to_string(), sizer);
        Ok(())
    }

    pub fn register_filter(
        &mut self,
        name: &str,
        transform: Transform,
    ) -> Result<(), RegistryError> {
        let filter = match transform {
            Transform::Filter(filter) => filter,
            other => {
                return Err(RegistryError::InvalidSubclass {
                    name: name.to_string(),
                    expected: TransformKind::Filter,
                    found: other.kind(),
                });
            }
        };
        validate_name(TransformKind::Filter, name)?;
        if self.filters.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: TransformKind::Filter,
                name: name.to_string(),
            });
        }
        self.filters.insert(name.to_string(), filter);
        Ok(())
    }

    pub fn unregister_sizer(&mut self, name: &str) -> Result<(), RegistryError> {
        self.sizers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotRegistered {
                kind: TransformKind::Sizer,
                name: name.to_string(),
            })
    }

    pub fn unregister_filter(&mut self, name: &str) -> Result<(), RegistryError> {
        self.filters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotRegistered {
                kind: TransformKind::Filter,
                name: name.to_string(),
            })
    }

    pub fn sizer(&self, name: &str) -> Option<&Arc<dyn Sizer>> {
        self.sizers.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    /// Registered sizers in name order.
    pub fn sizers(&self) -> impl Iterator<Item = (&str, &Arc<dyn Sizer>)> {
        self.sizers.iter().map(|(name, sizer)| (name.as_str(), sizer))
    }

    pub fn sizer_names(&self) -> impl Iterator<Item = &str> {
        self.sizers.keys().map(String::as_str)
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Load every plugin in order, rolling back any plugin that fails.
    ///
    /// Stops at the first plugin whose failure is anything other than
    /// [`PluginError::NoTransforms`]. Plugins loaded before it stay
    /// registered.
    pub fn discover(&mut self, plugins: &[&dyn TransformPlugin]) -> Result<(), DiscoveryError> {
        for plugin in plugins {
            let snapshot = self.clone();
            match plugin.register(self) {
                Ok(()) => {
                    tracing::debug!(plugin = plugin.name(), "registered transforms");
                }
                Err(err) => {
                    *self = snapshot;
                    if matches!(err, PluginError::NoTransforms) {
                        tracing::debug!(plugin = plugin.name(), "no transforms to register");
                        continue;
                    }
                    return Err(DiscoveryError {
                        plugin: plugin.name().to_string(),
                        source: err,
                    });
                }
            }
        }
        Ok(())
    }
}

fn validate_name(kind: TransformKind, name: &str) -> Result<(), RegistryError> {
    let reason = if name.starts_with('_') {
        Some("names may not start with an underscore")
    } else if name.contains("__") {
        Some("names may not contain a double underscore")
    } else if RESERVED_NAMES.contains(&name) {
        Some("the name is reserved")
    } else if !is_identifier(name) {
        Some("names must start with a letter and contain only letters, digits and underscores")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RegistryError::UnallowedName {
            kind,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
