//! Index configuration.
//!
//! [`IndexConfig`] is assembled with [`IndexConfigBuilder`] for a fresh index,
//! or read back from the `config.json` record of a persisted one and adjusted
//! with [`OpenOptions`]. [`IndexSettings`] layers defaults, a TOML file and
//! `VECDEX_*` environment variables into a builder.
//!
//! # Record format
//!
//! ```json
//! {
//!   "space": "l2",
//!   "dimension": 5,
//!   "maxElements": 1000,
//!   "graphDegree": 16,
//!   "efConstruction": 100,
//!   "efSearch": 10,
//!   "numThreads": 8,
//!   "persistOnWrite": true,
//!   "allowReplaceDeleted": false,
//!   "readOnly": false,
//!   "resizeFactor": 1.2
//! }
//! ```
//!
//! The persist location is never written into the record; it is the
//! directory the record lives in.

use crate::distance::Space;
use crate::error::{Error, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the configuration record inside a persist directory.
pub const CONFIG_FILE: &str = "config.json";

/// Default graph degree (M).
pub const DEFAULT_GRAPH_DEGREE: usize = 16;
/// Default construction breadth.
pub const DEFAULT_EF_CONSTRUCTION: usize = 100;
/// Default search breadth.
pub const DEFAULT_EF_SEARCH: usize = 10;
/// Default initial capacity.
pub const DEFAULT_MAX_ELEMENTS: usize = 1000;
/// Default capacity growth factor.
pub const DEFAULT_RESIZE_FACTOR: f64 = 1.2;

/// Parameters of one index.
///
/// `dimension == 0` means "unset": the first successful insert fixes it and it
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Similarity space.
    pub space: Space,
    /// Vector dimension, 0 until the first insert.
    pub dimension: usize,
    /// Current capacity.
    pub max_elements: usize,
    /// Graph degree (M).
    pub graph_degree: usize,
    /// Construction breadth.
    pub ef_construction: usize,
    /// Default search breadth.
    pub ef_search: usize,
    /// Worker threads the engine may use inside a single call.
    pub num_threads: usize,
    /// Directory holding the record and engine artifacts.
    #[serde(skip)]
    pub persist_location: Option<PathBuf>,
    /// Flush engine state after every successful mutation.
    pub persist_on_write: bool,
    /// Let inserts reclaim tombstoned slots.
    pub allow_replace_deleted: bool,
    /// Reject every mutation.
    pub read_only: bool,
    /// Capacity multiplier applied on automatic growth. Must be `> 1.0`.
    pub resize_factor: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            space: Space::L2,
            dimension: 0,
            max_elements: DEFAULT_MAX_ELEMENTS,
            graph_degree: DEFAULT_GRAPH_DEGREE,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            num_threads: default_num_threads(),
            persist_location: None,
            persist_on_write: true,
            allow_replace_deleted: false,
            read_only: false,
            resize_factor: DEFAULT_RESIZE_FACTOR,
        }
    }
}

fn default_num_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn invalid(key: &str, message: impl std::fmt::Display) -> Error {
    Error::InvalidArgument(format!("invalid value for '{key}': {message}"))
}

impl IndexConfig {
    /// Starts a builder with default values.
    #[must_use]
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Validates every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_elements == 0 {
            return Err(invalid("maxElements", "must be at least 1"));
        }
        if self.graph_degree < 2 {
            return Err(invalid(
                "graphDegree",
                format!("{} is below the minimum of 2", self.graph_degree),
            ));
        }
        if self.ef_construction == 0 {
            return Err(invalid("efConstruction", "must be at least 1"));
        }
        if self.ef_search == 0 {
            return Err(invalid("efSearch", "must be at least 1"));
        }
        if self.num_threads == 0 {
            return Err(invalid("numThreads", "must be at least 1"));
        }
        if !self.resize_factor.is_finite() || self.resize_factor <= 1.0 {
            return Err(invalid(
                "resizeFactor",
                format!("{} must be a finite value greater than 1.0", self.resize_factor),
            ));
        }
        Ok(())
    }

    /// Writes the record to `dir/config.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_record(&self, dir: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), data)?;
        tracing::debug!(path = %dir.display(), "configuration record written");
        Ok(())
    }

    /// Reads the record from `dir/config.json` and attaches `dir` as the
    /// persist location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record is missing, or a
    /// serialization error if it cannot be parsed.
    pub fn read_record(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };
        let mut config: Self = serde_json::from_str(&data)?;
        config.persist_location = Some(dir.to_path_buf());
        Ok(config)
    }
}

/// Builder for [`IndexConfig`].
///
/// Setters only record values; [`IndexConfigBuilder::build`] validates.
///
/// ```rust,ignore
/// let config = IndexConfig::builder()
///     .space(Space::Cosine)
///     .max_elements(10_000)
///     .persist_location("./data/idx")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Sets the similarity space.
    #[must_use]
    pub fn space(mut self, space: Space) -> Self {
        self.config.space = space;
        self
    }

    /// Fixes the dimension up front instead of on first insert.
    #[must_use]
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Sets the initial capacity.
    #[must_use]
    pub fn max_elements(mut self, max_elements: usize) -> Self {
        self.config.max_elements = max_elements;
        self
    }

    /// Sets the graph degree (M).
    #[must_use]
    pub fn graph_degree(mut self, m: usize) -> Self {
        self.config.graph_degree = m;
        self
    }

    /// Sets the construction breadth.
    #[must_use]
    pub fn ef_construction(mut self, ef: usize) -> Self {
        self.config.ef_construction = ef;
        self
    }

    /// Sets the default search breadth.
    #[must_use]
    pub fn ef_search(mut self, ef: usize) -> Self {
        self.config.ef_search = ef;
        self
    }

    /// Sets the engine's per-call thread budget.
    #[must_use]
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = n;
        self
    }

    /// Sets the persist directory. It must not exist yet.
    #[must_use]
    pub fn persist_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.persist_location = Some(path.into());
        self
    }

    /// Sets whether every mutation is flushed immediately.
    #[must_use]
    pub fn persist_on_write(mut self, enabled: bool) -> Self {
        self.config.persist_on_write = enabled;
        self
    }

    /// Sets whether inserts may reclaim tombstoned slots.
    #[must_use]
    pub fn allow_replace_deleted(mut self, enabled: bool) -> Self {
        self.config.allow_replace_deleted = enabled;
        self
    }

    /// Sets the growth factor used when an insert overflows capacity.
    #[must_use]
    pub fn resize_factor(mut self, factor: f64) -> Self {
        self.config.resize_factor = factor;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if any value is out of range.
    pub fn build(self) -> Result<IndexConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Overrides applied when reopening a persisted index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenOptions {
    /// Minimum capacity; the engine grows on init if the persisted one is smaller.
    pub max_elements: Option<usize>,
    /// Default search breadth.
    pub ef_search: Option<usize>,
    /// Per-call thread budget.
    pub num_threads: Option<usize>,
    /// Open without write access.
    pub read_only: bool,
}

impl OpenOptions {
    /// Creates empty overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests at least `max_elements` capacity.
    #[must_use]
    pub fn max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = Some(max_elements);
        self
    }

    /// Overrides the default search breadth.
    #[must_use]
    pub fn ef_search(mut self, ef: usize) -> Self {
        self.ef_search = Some(ef);
        self
    }

    /// Overrides the thread budget.
    #[must_use]
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Opens the index read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Applies the overrides to a record read from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the result fails validation.
    pub(crate) fn apply(&self, config: &mut IndexConfig) -> Result<()> {
        if let Some(ef) = self.ef_search {
            config.ef_search = ef;
        }
        if let Some(n) = self.num_threads {
            config.num_threads = n;
        }
        if let Some(max) = self.max_elements {
            if max == 0 {
                return Err(invalid("maxElements", "must be at least 1"));
            }
        }
        config.read_only = self.read_only;
        config.validate()
    }
}

/// Layered index settings: defaults, then a TOML file, then `VECDEX_*`
/// environment variables.
///
/// ```toml
/// space = "cosine"
/// max_elements = 50000
/// graph_degree = 32
/// persist_location = "./data/embeddings"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Similarity space.
    pub space: Space,
    /// Fixed dimension, 0 = from first insert.
    pub dimension: usize,
    /// Initial capacity.
    pub max_elements: usize,
    /// Graph degree (M).
    pub graph_degree: usize,
    /// Construction breadth.
    pub ef_construction: usize,
    /// Default search breadth.
    pub ef_search: usize,
    /// Thread budget; `None` = available parallelism.
    pub num_threads: Option<usize>,
    /// Persist directory.
    pub persist_location: Option<PathBuf>,
    /// Let inserts reclaim tombstoned slots.
    pub allow_replace_deleted: bool,
    /// Growth factor.
    pub resize_factor: f64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            space: Space::L2,
            dimension: 0,
            max_elements: DEFAULT_MAX_ELEMENTS,
            graph_degree: DEFAULT_GRAPH_DEGREE,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            num_threads: None,
            persist_location: None,
            allow_replace_deleted: false,
            resize_factor: DEFAULT_RESIZE_FACTOR,
        }
    }
}

impl IndexSettings {
    /// Loads settings from `vecdex.toml` in the working directory and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from_path("vecdex.toml")
    }

    /// Loads settings from a specific TOML file and the environment.
    ///
    /// A missing file is not an error; it contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed, or
    /// [`Error::InvalidArgument`] if the merged values are out of range.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VECDEX_"));

        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a TOML string on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if parsing fails, or
    /// [`Error::InvalidArgument`] if a value is out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings against the same rules as [`IndexConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.builder().build().map(drop)
    }

    /// Serializes the settings to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Turns the settings into a builder for further adjustment.
    #[must_use]
    pub fn builder(&self) -> IndexConfigBuilder {
        let mut builder = IndexConfig::builder()
            .space(self.space)
            .dimension(self.dimension)
            .max_elements(self.max_elements)
            .graph_degree(self.graph_degree)
            .ef_construction(self.ef_construction)
            .ef_search(self.ef_search)
            .allow_replace_deleted(self.allow_replace_deleted)
            .resize_factor(self.resize_factor);
        if let Some(n) = self.num_threads {
            builder = builder.num_threads(n);
        }
        if let Some(path) = &self.persist_location {
            builder = builder.persist_location(path.clone());
        }
        builder
    }
}
