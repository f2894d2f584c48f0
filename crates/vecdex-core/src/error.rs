//! Error types for `vecdex`.
//!
//! Every public operation returns [`Result`]. Validation failures are raised
//! before the engine boundary is crossed; failures reported by the engine are
//! wrapped verbatim in [`Error::Engine`].

use crate::engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for `vecdex` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `vecdex` operations.
///
/// Error codes follow the pattern `VECDEX-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument (VECDEX-001).
    ///
    /// Empty batches, length mismatches, shrinking resizes, bad option values.
    #[error("[VECDEX-001] Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector dimension mismatch (VECDEX-002).
    #[error("[VECDEX-002] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Label repeated within one batch (VECDEX-003).
    #[error("[VECDEX-003] Label {0} appears more than once in the batch")]
    DuplicateLabel(u64),

    /// Mutation attempted on a read-only index (VECDEX-004).
    #[error("[VECDEX-004] Permission denied: {0}")]
    PermissionDenied(String),

    /// Persist location already exists on create (VECDEX-005).
    #[error("[VECDEX-005] Persist location '{}' already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// Persist location missing on open (VECDEX-006).
    #[error("[VECDEX-006] Persist location '{}' not found", .0.display())]
    NotFound(PathBuf),

    /// Capacity growth failed (VECDEX-007).
    #[error("[VECDEX-007] Capacity exceeded: could not grow to {requested} elements: {reason}")]
    CapacityExceeded {
        /// Capacity that was requested.
        requested: usize,
        /// Why the growth failed.
        reason: String,
    },

    /// Failure reported by the wrapped engine (VECDEX-008).
    #[error("[VECDEX-008] Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Operation issued after `close` (VECDEX-009).
    #[error("[VECDEX-009] Index is closed")]
    Closed,

    /// Configuration error (VECDEX-010).
    #[error("[VECDEX-010] Configuration error: {0}")]
    Config(String),

    /// IO error (VECDEX-011).
    #[error("[VECDEX-011] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (VECDEX-012).
    #[error("[VECDEX-012] Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns the error code (e.g., "VECDEX-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "VECDEX-001",
            Self::DimensionMismatch { .. } => "VECDEX-002",
            Self::DuplicateLabel(_) => "VECDEX-003",
            Self::PermissionDenied(_) => "VECDEX-004",
            Self::AlreadyExists(_) => "VECDEX-005",
            Self::NotFound(_) => "VECDEX-006",
            Self::CapacityExceeded { .. } => "VECDEX-007",
            Self::Engine(_) => "VECDEX-008",
            Self::Closed => "VECDEX-009",
            Self::Config(_) => "VECDEX-010",
            Self::Io(_) => "VECDEX-011",
            Self::Serialization(_) => "VECDEX-012",
        }
    }

    /// Returns true for caller mistakes caught before the engine was touched.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::DimensionMismatch { .. } | Self::DuplicateLabel(_)
        )
    }

    /// Returns true if this error is recoverable.
    ///
    /// A closed handle and corrupted engine artifacts are not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Closed | Self::Engine(EngineError::Corrupted(_)))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
