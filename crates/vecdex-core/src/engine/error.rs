//! Errors reported by an engine.

use crate::Label;
use thiserror::Error;

/// Failure reported across the engine boundary.
///
/// The index layer passes these through unchanged, except for
/// [`EngineError::Allocation`] raised while growing, which it reports as a
/// capacity failure.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An operation ran before `init`.
    #[error("engine is not initialized")]
    NotInitialized,

    /// The label is already stored and cannot be reused.
    #[error("label {0} is already present")]
    DuplicateLabel(Label),

    /// The label is not stored.
    #[error("label {0} not found")]
    LabelNotFound(Label),

    /// The label is already tombstoned.
    #[error("label {0} is already deleted")]
    AlreadyDeleted(Label),

    /// The vectors do not match the engine's dimension.
    #[error("dimension mismatch: engine holds {expected}, batch has {actual}")]
    DimensionMismatch {
        /// Engine dimension.
        expected: usize,
        /// Batch dimension.
        actual: usize,
    },

    /// Not enough capacity for the request.
    #[error("capacity {capacity} cannot hold {required} elements")]
    CapacityExhausted {
        /// Current capacity.
        capacity: usize,
        /// Elements the request needs.
        required: usize,
    },

    /// Storage could not be allocated.
    #[error("allocation of {requested} elements failed: {reason}")]
    Allocation {
        /// Elements requested.
        requested: usize,
        /// Allocator message.
        reason: String,
    },

    /// The worker pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(String),

    /// Persisted artifacts are unreadable.
    #[error("corrupted artifacts: {0}")]
    Corrupted(String),

    /// IO failure while reading or writing artifacts.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
