//! The public face of one image: a source path on a storage, bound to
//! every registered transform.
//!
//! ```text
//! let mut image = engine.bind(storage, Some("photos/cat.jpg"))?;
//! image.sizer("crop")?.get("400x400")?.url;                     // crop
//! image.filters().get("invert")?.url();                          // invert
//! image.filters().get("invert")?.sizer("thumbnail")?.get("90x90")?; // invert, then thumbnail
//! image.url_for_key("filters__invert__crop__100x100")?;          // same, by key
//! image.delete_all_created_images()?;
//! ```
//!
//! Without a source path, the configured placeholder policy decides what
//! renditions derive from (see [`crate::placeholder`]).

use crate::engine::Engine;
use crate::filtered::FilterLibrary;
use crate::keys::{ImageKey, RenditionKeySet};
use crate::lifecycle::delete_matching_files;
use crate::placeholder::PlaceholderPolicy;
use crate::ppoi::Ppoi;
use crate::processed::{ProcessedImage, RenditionError, Source};
use crate::sized::{SizedImage, bind_sizers};
use crate::storage::Storage;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct BoundImage {
    engine: Arc<Engine>,
    storage: Arc<dyn Storage>,
    name: Option<String>,
    source: Source,
    ppoi: Ppoi,
    create_on_demand: bool,
    sizers: BTreeMap<String, SizedImage>,
    filters: FilterLibrary,
}

impl BoundImage {
    pub(crate) fn new(
        engine: Arc<Engine>,
        storage: Arc<dyn Storage>,
        path: Option<&str>,
    ) -> Result<Self, RenditionError> {
        let name = path.filter(|p| !p.is_empty()).map(str::to_string);
        let source = match &name {
            Some(path) => Source::Stored(path.clone()),
            None => resolve_placeholder(&engine, storage.as_ref())?,
        };
        let create_on_demand = engine.settings().create_on_demand;
        let image = processed_image(&engine, &storage, &source, create_on_demand);
        let ppoi = Ppoi::CENTER;
        Ok(Self {
            sizers: bind_sizers(&image, engine.registry(), ppoi),
            filters: FilterLibrary::new(image, Arc::clone(engine.registry()), ppoi),
            engine,
            storage,
            name,
            source,
            ppoi,
            create_on_demand,
        })
    }

    /// Source path, `None` when bound without one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// What renditions are derived from; a placeholder when there is no source.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// URL of the source, or of the local placeholder standing in for it.
    pub fn url(&self) -> Option<String> {
        match &self.source {
            Source::Stored(path) => Some(self.storage.url(path)),
            _ => None,
        }
    }

    pub fn ppoi(&self) -> Ppoi {
        self.ppoi
    }

    /// Change the point of interest. Sizers and filters are rebound, so
    /// previously resolved renditions are forgotten.
    pub fn set_ppoi(&mut self, ppoi: Ppoi) {
        self.ppoi = ppoi;
        self.rebuild();
    }

    pub fn create_on_demand(&self) -> bool {
        self.create_on_demand
    }

    pub fn set_create_on_demand(&mut self, create_on_demand: bool) {
        self.create_on_demand = create_on_demand;
        self.rebuild();
    }

    pub fn sizer(&mut self, name: &str) -> Result<&mut SizedImage, RenditionError> {
        self.sizers
            .get_mut(name)
            .ok_or_else(|| RenditionError::UnknownSizer(name.to_string()))
    }

    pub fn sizer_names(&self) -> impl Iterator<Item = &str> {
        self.sizers.keys().map(String::as_str)
    }

    pub fn filters(&mut self) -> &mut FilterLibrary {
        &mut self.filters
    }

    /// Resolve an image key like `crop__400x400` or `filters__invert__url`.
    pub fn url_for_key(&mut self, key: &str) -> Result<String, RenditionError> {
        match ImageKey::parse(key)? {
            ImageKey::Original => self.url().ok_or(RenditionError::MissingSource),
            ImageKey::Sized {
                sizer,
                width,
                height,
            } => Ok(self.sizer(&sizer)?.get_size(width, height)?.url),
            ImageKey::Filtered { filter } => Ok(self.filters.get(&filter)?.url().to_string()),
            ImageKey::FilteredSized {
                filter,
                sizer,
                width,
                height,
            } => Ok(self
                .filters
                .get(&filter)?
                .sizer(&sizer)?
                .get_size(width, height)?
                .url),
        }
    }

    /// Resolve every key of `set` into `label → url`. Empty when there is
    /// nothing on storage to derive from.
    pub fn build_url_set(
        &mut self,
        set: &RenditionKeySet,
    ) -> Result<BTreeMap<String, String>, RenditionError> {
        let mut urls = BTreeMap::new();
        if !matches!(self.source, Source::Stored(_)) {
            return Ok(urls);
        }
        for (label, key) in set.entries() {
            let url = self.url_for_key(key)?;
            urls.insert(label.clone(), url);
        }
        Ok(urls)
    }

    /// Delete filtered renditions of the source. Returns the deleted paths.
    pub fn delete_filtered_images(&mut self) -> Result<Vec<String>, RenditionError> {
        let Some(name) = self.name.as_deref() else {
            return Ok(Vec::new());
        };
        let folder = self.engine.codec().filtered_root_folder(name);
        let pattern = self.engine.patterns().filter().cloned();
        self.delete_matching(&folder, pattern)
    }

    /// Delete sized renditions of the source.
    pub fn delete_sized_images(&mut self) -> Result<Vec<String>, RenditionError> {
        let Some(name) = self.name.as_deref() else {
            return Ok(Vec::new());
        };
        let folder = self.engine.codec().sized_root_folder(name);
        let pattern = self.engine.patterns().sizer().cloned();
        self.delete_matching(&folder, pattern)
    }

    /// Delete sized renditions of the filtered renditions of the source.
    pub fn delete_filtered_sized_images(&mut self) -> Result<Vec<String>, RenditionError> {
        let Some(name) = self.name.as_deref() else {
            return Ok(Vec::new());
        };
        let folder = self.engine.codec().filtered_sized_root_folder(name);
        let pattern = self.engine.patterns().filter_and_sizer().cloned();
        self.delete_matching(&folder, pattern)
    }

    pub fn delete_all_created_images(&mut self) -> Result<Vec<String>, RenditionError> {
        let mut deleted = self.delete_filtered_images()?;
        deleted.extend(self.delete_sized_images()?);
        deleted.extend(self.delete_filtered_sized_images()?);
        Ok(deleted)
    }

    fn delete_matching(
        &mut self,
        folder: &str,
        pattern: Option<Regex>,
    ) -> Result<Vec<String>, RenditionError> {
        let Some(name) = self.name.as_deref() else {
            return Ok(Vec::new());
        };
        let deleted = delete_matching_files(
            self.storage.as_ref(),
            self.engine.cache().as_ref(),
            name,
            folder,
            pattern.as_ref(),
        )?;
        if !deleted.is_empty() {
            self.rebuild();
        }
        Ok(deleted)
    }

    fn rebuild(&mut self) {
        let image = processed_image(
            &self.engine,
            &self.storage,
            &self.source,
            self.create_on_demand,
        );
        self.sizers = bind_sizers(&image, self.engine.registry(), self.ppoi);
        self.filters = FilterLibrary::new(image, Arc::clone(self.engine.registry()), self.ppoi);
    }
}

fn processed_image(
    engine: &Engine,
    storage: &Arc<dyn Storage>,
    source: &Source,
    create_on_demand: bool,
) -> ProcessedImage {
    ProcessedImage::new(
        source.clone(),
        Arc::clone(storage),
        Arc::clone(engine.cache()),
        Arc::clone(engine.codec()),
        engine.settings().cache_ttl,
        create_on_demand,
    )
}

fn resolve_placeholder(engine: &Engine, storage: &dyn Storage) -> Result<Source, RenditionError> {
    match &engine.settings().placeholder {
        PlaceholderPolicy::None => Ok(Source::Missing),
        PlaceholderPolicy::Service { base_url } => Ok(Source::PlaceholderService {
            base_url: base_url.clone(),
        }),
        PlaceholderPolicy::Image(placeholder) => {
            let path = engine.codec().placeholder_path(&placeholder.file_name());
            placeholder.install(storage, &path)?;
            Ok(Source::Stored(path))
        }
    }
}
