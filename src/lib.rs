//! # Renditions
//!
//! On-demand, cached generation of sized and filtered variants of stored
//! images. A source image is bound to every registered transform; asking
//! for a rendition computes its path deterministically, and the file is only
//! created the first time it is needed.
//!
//! ```text
//! source      photos/cat.jpg
//! sized       __sized__/photos/cat-crop-c0-5__0-5-400x400-70.jpg
//! filtered    photos/__filtered__/cat__invert__.jpg
//! both        __sized__/photos/__filtered__/cat__invert__-crop-c0-5__0-5-100x100-70.jpg
//! ```
//!
//! # Architecture: Derive On Demand
//!
//! Every rendition goes through the same three steps:
//!
//! 1. **Name**: the target path is a pure function of the source path, the
//!    transform name, the size and the point of primary interest (PPOI).
//! 2. **Check**: an existence cache, keyed by the target URL, answers
//!    "was this already created?" without touching storage.
//! 3. **Create**: on a miss, storage is asked; only if the file is really
//!    absent is the source decoded, transformed and saved.
//!
//! Because names are deterministic, nothing records what was created.
//! Deleting renditions lists the rendition directories and matches file
//! names against patterns rebuilt from the registered transform names.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Process-wide context: registry, cache, settings, deletion patterns |
//! | [`binder`] | [`BoundImage`], one source bound to all transforms |
//! | [`registry`] | Named sizer and filter registrations, plugin discovery |
//! | [`transforms`] | Built-in `crop`, `thumbnail` and `invert` |
//! | [`processed`] | Shared pipeline: retrieve, preprocess, transform, save, existence check |
//! | [`sized`] | [`sized::Sizer`] trait and `WxH`-keyed sized renditions |
//! | [`filtered`] | [`filtered::Filter`] trait and filtered renditions |
//! | [`naming`] | Rendition path construction and key post-processing |
//! | [`keys`] | Image key parsing (`crop__400x400`) and rendition key sets |
//! | [`lifecycle`] | Deleting the renditions of a source |
//! | [`cache`] | Existence cache backends |
//! | [`storage`] | Storage abstraction with filesystem and in-memory backends |
//! | [`placeholder`] | What renditions derive from when there is no source |
//! | [`config`] | `config.toml` loading and validation |
//! | [`ppoi`] | Point of primary interest |
//! | [`imaging`] | Pure-Rust decode, encode and pixel operations via the `image` crate |
//!
//! # Design Decisions
//!
//! ## Storage Is the Source of Truth
//!
//! The existence cache is only ever a shortcut. A cache miss always falls
//! back to asking storage, so a cold or wiped cache costs I/O but never
//! recreates a rendition that already exists.
//!
//! ## Explicit Discovery
//!
//! Transforms are registered by [`registry::TransformPlugin`]s passed to
//! [`Engine::from_config`]. A plugin that fails leaves the registry exactly
//! as it was before that plugin ran.
//!
//! ## Pure-Rust Imaging
//!
//! All decoding, resampling and encoding goes through the `image` crate, so
//! the binary carries no system image libraries.

pub mod binder;
pub mod cache;
pub mod config;
pub mod engine;
pub mod filtered;
pub mod imaging;
pub mod keys;
pub mod lifecycle;
pub mod naming;
pub mod placeholder;
pub mod ppoi;
pub mod processed;
pub mod registry;
pub mod sized;
pub mod storage;
pub mod transforms;

pub use binder::BoundImage;
pub use engine::{Engine, EngineError};
pub use ppoi::{Ppoi, PpoiError};
pub use processed::RenditionError;

#[cfg(test)]
pub(crate) mod test_helpers;
