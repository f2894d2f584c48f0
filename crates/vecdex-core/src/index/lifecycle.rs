//! Index lifecycle (create, open, close, persist).

use super::handle::EngineHandle;
use super::{read_only_error, Index};
use crate::config::{IndexConfig, OpenOptions};
use crate::distance::Space;
use crate::engine::{Engine, EngineConfig, EngineParams};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

impl<E: Engine> Index<E> {
    /// Creates a fresh index.
    ///
    /// With a persist location, the directory must not exist yet: it is
    /// created, `persist_on_write` is forced on and the configuration record is
    /// written. The engine is created but not initialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid configuration,
    /// [`Error::AlreadyExists`] if the persist location exists, or an IO error.
    pub fn create(mut config: IndexConfig) -> Result<Self> {
        config.validate()?;
        config.read_only = false;

        if let Some(dir) = config.persist_location.clone() {
            if dir.exists() {
                return Err(Error::AlreadyExists(dir));
            }
            std::fs::create_dir_all(&dir)?;
            config.persist_on_write = true;
            config.write_record(&dir)?;
        }

        let engine = E::create(EngineConfig::from(&config))?;
        info!(
            space = ?config.space,
            dimension = config.dimension,
            max_elements = config.max_elements,
            persisted = config.persist_location.is_some(),
            "Index created"
        );
        Ok(Self::from_parts(config, EngineHandle::Uninitialized(engine)))
    }

    /// Opens a persisted index.
    ///
    /// The engine is initialized immediately. Capacity and graph parameters
    /// are taken from the live engine rather than the stored record, and the
    /// reconciled record is written back unless the index is read-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `path` or its record is missing,
    /// [`Error::InvalidArgument`] for invalid overrides, or an engine error if
    /// the artifacts cannot be loaded.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let dir = path.as_ref();
        if !dir.exists() {
            return Err(Error::NotFound(dir.to_path_buf()));
        }

        let mut config = IndexConfig::read_record(dir)?;
        options.apply(&mut config)?;

        // The record's capacity only sizes an engine that has no artifacts yet.
        let mut engine_config = EngineConfig::from(&config);
        engine_config.min_capacity = options.max_elements.unwrap_or(0);

        let mut engine = E::create(engine_config)?;
        engine.init()?;
        reconcile(&mut config, engine.params());

        if !config.read_only {
            config.write_record(dir)?;
        }

        info!(
            path = %dir.display(),
            elements = engine.counts().total,
            max_elements = config.max_elements,
            read_only = config.read_only,
            "Index opened"
        );
        Ok(Self::from_parts(config, EngineHandle::Initialized(engine)))
    }

    /// Releases the engine. Later operations fail with [`Error::Closed`].
    ///
    /// Closing a never-initialized or already closed index does nothing else.
    /// Unflushed changes are not written.
    pub fn close(&self) {
        if self.inner.write().handle.close() {
            info!("Index closed");
        }
    }

    /// Flushes engine state to the persist location. Without a location this
    /// is a no-op.
    ///
    /// The configuration record is left as is; it is rewritten by the
    /// operations that change it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] on a read-only index, or the
    /// engine's write error.
    pub fn persist(&self) -> Result<()> {
        let mut guard = self.write_initialized()?;
        let inner = &mut *guard;
        if inner.config.read_only {
            return Err(read_only_error("persist"));
        }

        inner.handle.engine_mut()?.persist()?;
        debug!("Index persisted");
        Ok(())
    }
}

/// Overwrites the parameters the engine owns with its live values.
fn reconcile(config: &mut IndexConfig, params: EngineParams) {
    let space = Space::from_engine_metric(params.metric);
    if config.max_elements != params.max_elements
        || config.dimension != params.dimension
        || config.space != space
    {
        debug!(
            record_max_elements = config.max_elements,
            engine_max_elements = params.max_elements,
            record_dimension = config.dimension,
            engine_dimension = params.dimension,
            "Configuration record reconciled with engine state"
        );
    }

    config.space = space;
    config.dimension = params.dimension;
    config.max_elements = params.max_elements;
    config.graph_degree = params.graph_degree;
    config.ef_construction = params.ef_construction;
}
