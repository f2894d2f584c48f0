//! The index: lifecycle, capacity and identity management over an engine.
//!
//! This module provides [`Index`], split by concern:
//! - Lifecycle: create, open, close, persist
//! - Mutation: add, delete, resize
//! - Query: filtered k-NN
//! - Accessors: counts, labels, stored vectors, configuration

mod accessors;
mod handle;
mod lifecycle;
mod mutation;
mod query;


pub use query::QueryOptions;

use crate::config::IndexConfig;
use crate::engine::{Engine, NativeEngine};
use crate::error::{Error, Result};
use handle::EngineHandle;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Inner<E> {
    config: IndexConfig,
    handle: EngineHandle<E>,
}

/// A growable, persistent approximate nearest-neighbour index.
///
/// The engine is created with the index but initialized lazily by the first
/// operation that needs it. Queries and accessors share a read lock; add,
/// delete, resize, persist and close take the write lock.
///
/// # Example
///
/// ```rust,ignore
/// use vecdex_core::{Index, IndexConfig, QueryOptions, Space};
///
/// let index: Index = Index::create(
///     IndexConfig::builder()
///         .space(Space::Cosine)
///         .max_elements(2)
///         .build()?,
/// )?;
/// index.add(&[vec![0.1, 0.9], vec![0.8, 0.2]], &[1, 2])?;
/// let hits = index.query(&[vec![0.1, 0.8]], 1, &QueryOptions::default())?;
/// assert_eq!(hits[0][0].label, 1);
/// ```
pub struct Index<E: Engine = NativeEngine> {
    inner: RwLock<Inner<E>>,
}

impl<E: Engine> std::fmt::Debug for Index<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Index")
            .field("config", &inner.config)
            .field("initialized", &inner.handle.is_initialized())
            .field("closed", &inner.handle.is_closed())
            .finish()
    }
}

impl<E: Engine> Index<E> {
    fn from_parts(config: IndexConfig, handle: EngineHandle<E>) -> Self {
        Self {
            inner: RwLock::new(Inner { config, handle }),
        }
    }

    /// Shared access to an initialized engine.
    ///
    /// The fast path is a read lock. On first use the write lock is taken to
    /// run init and then downgraded, so no writer can slip in between.
    fn read_initialized(&self) -> Result<RwLockReadGuard<'_, Inner<E>>> {
        {
            let inner = self.inner.read();
            if inner.handle.is_initialized() {
                return Ok(inner);
            }
            if inner.handle.is_closed() {
                return Err(Error::Closed);
            }
        }

        let mut inner = self.inner.write();
        inner.handle.ensure_init()?;
        Ok(RwLockWriteGuard::downgrade(inner))
    }

    /// Exclusive access to an initialized engine.
    fn write_initialized(&self) -> Result<RwLockWriteGuard<'_, Inner<E>>> {
        let mut inner = self.inner.write();
        inner.handle.ensure_init()?;
        Ok(inner)
    }
}

fn read_only_error(operation: &str) -> Error {
    Error::PermissionDenied(format!("cannot {operation} a read-only index"))
}
