//! Owning handle around the engine with an explicit lifecycle.
//!
//! `Uninitialized → Initialized → Closed`. The engine value moves between
//! states, so a closed handle holds nothing: use-after-close is an
//! [`Error::Closed`] and release happens exactly once, when the engine is
//! dropped.

use crate::engine::Engine;
use crate::error::{Error, Result};

pub(crate) enum EngineHandle<E> {
    Uninitialized(E),
    Initialized(E),
    Closed,
}

impl<E: Engine> EngineHandle<E> {
    pub(crate) fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Runs engine init on first use. A failed init leaves the handle
    /// uninitialized so the next call retries.
    pub(crate) fn ensure_init(&mut self) -> Result<()> {
        match std::mem::replace(self, Self::Closed) {
            Self::Uninitialized(mut engine) => match engine.init() {
                Ok(()) => {
                    *self = Self::Initialized(engine);
                    tracing::debug!("Engine initialized");
                    Ok(())
                }
                Err(e) => {
                    *self = Self::Uninitialized(engine);
                    Err(e.into())
                }
            },
            initialized @ Self::Initialized(_) => {
                *self = initialized;
                Ok(())
            }
            Self::Closed => Err(Error::Closed),
        }
    }

    pub(crate) fn engine(&self) -> Result<&E> {
        match self {
            Self::Initialized(engine) => Ok(engine),
            Self::Uninitialized(_) | Self::Closed => Err(Error::Closed),
        }
    }

    pub(crate) fn engine_mut(&mut self) -> Result<&mut E> {
        match self {
            Self::Initialized(engine) => Ok(engine),
            Self::Uninitialized(_) | Self::Closed => Err(Error::Closed),
        }
    }

    /// Moves to `Closed`, dropping the engine. Returns false if the handle was
    /// already closed.
    pub(crate) fn close(&mut self) -> bool {
        !matches!(std::mem::replace(self, Self::Closed), Self::Closed)
    }
}
