//! The engine boundary.
//!
//! [`Engine`] is the capability contract the index layer drives: create,
//! lazy init, batch insert, tombstone, filtered k-NN, resize, persist, and
//! read-back of counts, labels and vectors. Releasing the engine is `Drop`.
//!
//! The engine owns graph construction and traversal; it does not validate
//! batches for emptiness, read-only mode or in-batch duplicates, which the
//! layer has already done before a call arrives.
//!
//! [`NativeEngine`] is the bundled hierarchical navigable small-world engine.

mod error;
mod native;

pub use error::EngineError;
pub use native::NativeEngine;

use crate::boundary::{EmbeddingBatch, KnnRequest, KnnResponse, LabelBuffer};
use crate::config::IndexConfig;
use crate::distance::EngineMetric;
use crate::Label;
use std::path::PathBuf;

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Parameters an engine is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Kernel configuration from the space selector.
    pub metric: EngineMetric,
    /// Dimension, 0 = fixed by the first insert.
    pub dimension: usize,
    /// Capacity of a fresh engine. Ignored when persisted artifacts are loaded.
    pub max_elements: usize,
    /// Lower bound on capacity after init, fresh or loaded. 0 = none.
    pub min_capacity: usize,
    /// Graph degree (M).
    pub graph_degree: usize,
    /// Construction breadth.
    pub ef_construction: usize,
    /// Worker threads for a single call.
    pub num_threads: usize,
    /// Directory for engine artifacts.
    pub persist_location: Option<PathBuf>,
}

impl From<&IndexConfig> for EngineConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            metric: config.space.engine_metric(),
            dimension: config.dimension,
            max_elements: config.max_elements,
            min_capacity: 0,
            graph_degree: config.graph_degree,
            ef_construction: config.ef_construction,
            num_threads: config.num_threads,
            persist_location: config.persist_location.clone(),
        }
    }
}

/// Aggregate slot accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineCounts {
    /// Occupied slots, tombstoned ones included.
    pub total: usize,
    /// Tombstoned slots.
    pub deleted: usize,
    /// Allocated slots.
    pub capacity: usize,
}

impl EngineCounts {
    /// Slots holding live vectors.
    #[must_use]
    pub fn active(&self) -> usize {
        self.total - self.deleted
    }
}

/// Live parameters of an initialized engine, used to reconcile a stale
/// configuration record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    /// Kernel configuration.
    pub metric: EngineMetric,
    /// Fixed dimension, 0 if nothing was inserted yet.
    pub dimension: usize,
    /// Allocated capacity.
    pub max_elements: usize,
    /// Graph degree (M).
    pub graph_degree: usize,
    /// Construction breadth.
    pub ef_construction: usize,
}

/// Capability contract of a wrapped search engine.
///
/// Mutating calls take `&mut self`; the index layer guarantees exclusive
/// access for them and shared access for the rest.
pub trait Engine: Send + Sync + Sized {
    /// Creates an engine without touching storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    fn create(config: EngineConfig) -> EngineResult<Self>;

    /// Allocates storage, or loads it from the persist location. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or loading fails.
    fn init(&mut self) -> EngineResult<()>;

    /// Inserts every vector of `batch` under its label.
    ///
    /// With `replace_deleted`, inserts may reuse tombstoned slots.
    ///
    /// # Errors
    ///
    /// Returns an error if a label collides, dimensions differ or capacity is
    /// short.
    fn insert_batch(&mut self, batch: &EmbeddingBatch, replace_deleted: bool) -> EngineResult<()>;

    /// Tombstones every label in `labels`.
    ///
    /// # Errors
    ///
    /// Returns an error if a label is missing or already deleted.
    fn mark_deleted(&mut self, labels: &LabelBuffer) -> EngineResult<()>;

    /// Runs a k-NN search for every query in `request`, writing hits into
    /// `response` nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query width differs from the engine's.
    fn search(&self, request: &KnnRequest<'_>, response: &mut KnnResponse) -> EngineResult<()>;

    /// Reallocates to `new_capacity`, preserving vectors, labels and
    /// tombstones.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity is below the element count or the
    /// allocation fails.
    fn resize(&mut self, new_capacity: usize) -> EngineResult<()>;

    /// Flushes dirty state to the persist location. A no-op when clean.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn persist(&mut self) -> EngineResult<()>;

    /// Current slot accounting.
    fn counts(&self) -> EngineCounts;

    /// Live parameters.
    fn params(&self) -> EngineParams;

    /// Stored labels in slot order, optionally skipping tombstones.
    fn labels(&self, active_only: bool) -> Vec<Label>;

    /// Vector for each requested label, `None` where it cannot be resolved.
    fn fetch_vectors(&self, labels: &LabelBuffer) -> Vec<Option<Vec<f32>>>;
}
