//! Mutating operations (add, delete, resize).
//!
//! Every argument check runs before the engine is called, so a rejected call
//! leaves the engine untouched. Once the engine is called its result is
//! returned as is; nothing is retried.

use super::{read_only_error, Index, Inner};
use crate::boundary::{EmbeddingBatch, LabelBuffer};
use crate::capacity::{ensure_monotonic, growth_target};
use crate::config::IndexConfig;
use crate::engine::{Engine, EngineError};
use crate::error::{Error, Result};
use crate::guard::ensure_unique_labels;
use crate::Label;
use tracing::{debug, info};

impl<E: Engine> Index<E> {
    /// Inserts `vectors` under `labels`.
    ///
    /// The first successful add fixes the dimension when it was left unset.
    /// If the batch does not fit, capacity grows once to
    /// `ceil(max_elements * resize_factor)` (or to exactly what the batch
    /// needs, if more) before anything is inserted.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] on a read-only index
    /// - [`Error::InvalidArgument`] for an empty batch or a length mismatch
    /// - [`Error::DimensionMismatch`] if a vector has the wrong length
    /// - [`Error::DuplicateLabel`] if a label repeats within the batch
    /// - [`Error::CapacityExceeded`] if growth fails
    /// - [`Error::Engine`] for collisions with stored labels
    pub fn add(&self, vectors: &[Vec<f32>], labels: &[Label]) -> Result<()> {
        let mut guard = self.write_initialized()?;
        let inner: &mut Inner<E> = &mut guard;
        if inner.config.read_only {
            return Err(read_only_error("add to"));
        }
        if vectors.is_empty() {
            return Err(Error::InvalidArgument("no vectors to add".to_string()));
        }
        if vectors.len() != labels.len() {
            return Err(Error::InvalidArgument(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }

        let dims = match inner.config.dimension {
            0 => vectors[0].len(),
            fixed => fixed,
        };
        if dims == 0 {
            return Err(Error::InvalidArgument(
                "vectors must have at least one component".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }
        ensure_unique_labels(labels)?;

        let engine = inner.handle.engine_mut()?;
        let counts = engine.counts();
        // Tombstoned slots are reusable when replacement is allowed.
        let occupied = if inner.config.allow_replace_deleted {
            counts.active()
        } else {
            counts.total
        };
        let grown = match growth_target(
            occupied,
            labels.len(),
            counts.capacity,
            inner.config.resize_factor,
        )? {
            Some(target) => {
                grow(engine, &mut inner.config, target)?;
                true
            }
            None => false,
        };

        let batch = EmbeddingBatch::pack(vectors, labels, dims)?;
        let inserted = engine.insert_batch(&batch, inner.config.allow_replace_deleted);
        drop(batch);

        if grown {
            write_record(&inner.config)?;
        }
        inserted?;

        if inner.config.dimension == 0 {
            inner.config.dimension = dims;
            write_record(&inner.config)?;
        }
        if inner.config.persist_on_write {
            engine.persist()?;
        }

        debug!(count = labels.len(), "Vectors added");
        Ok(())
    }

    /// Tombstones `labels`. Capacity is not reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] on a read-only index,
    /// [`Error::InvalidArgument`] for an empty list,
    /// [`Error::DuplicateLabel`] for a repeated label, or the engine's error
    /// for a label that is missing or already deleted.
    pub fn delete(&self, labels: &[Label]) -> Result<()> {
        let mut guard = self.write_initialized()?;
        let inner: &mut Inner<E> = &mut guard;
        if inner.config.read_only {
            return Err(read_only_error("delete from"));
        }
        if labels.is_empty() {
            return Err(Error::InvalidArgument("no labels to delete".to_string()));
        }
        ensure_unique_labels(labels)?;

        let buffer = LabelBuffer::pack(labels)?;
        let engine = inner.handle.engine_mut()?;
        engine.mark_deleted(&buffer)?;
        drop(buffer);

        if inner.config.persist_on_write {
            engine.persist()?;
        }
        debug!(count = labels.len(), "Labels deleted");
        Ok(())
    }

    /// Grows capacity to `new_capacity`, keeping vectors, labels and
    /// tombstones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] on a read-only index,
    /// [`Error::InvalidArgument`] if `new_capacity` is below the current
    /// capacity, or [`Error::CapacityExceeded`] if allocation fails.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        let mut guard = self.write_initialized()?;
        let inner: &mut Inner<E> = &mut guard;
        if inner.config.read_only {
            return Err(read_only_error("resize"));
        }

        let engine = inner.handle.engine_mut()?;
        ensure_monotonic(engine.counts().capacity, new_capacity)?;
        grow(engine, &mut inner.config, new_capacity)?;
        write_record(&inner.config)?;

        if inner.config.persist_on_write {
            engine.persist()?;
        }
        Ok(())
    }
}

/// Resizes the engine and records the new capacity.
fn grow<E: Engine>(engine: &mut E, config: &mut IndexConfig, target: usize) -> Result<()> {
    let from = engine.counts().capacity;
    engine.resize(target).map_err(|e| match e {
        EngineError::Allocation { reason, .. } => Error::CapacityExceeded {
            requested: target,
            reason,
        },
        other => Error::Engine(other),
    })?;
    config.max_elements = target;
    info!(from, to = target, "Index capacity grown");
    Ok(())
}

fn write_record(config: &IndexConfig) -> Result<()> {
    match &config.persist_location {
        Some(dir) => config.write_record(dir),
        None => Ok(()),
    }
}
