//! Read accessors.

use super::Index;
use crate::boundary::LabelBuffer;
use crate::config::IndexConfig;
use crate::engine::{Engine, EngineCounts};
use crate::error::{Error, Result};
use crate::Label;

impl<E: Engine> Index<E> {
    fn counts(&self) -> Result<EngineCounts> {
        let inner = self.read_initialized()?;
        Ok(inner.handle.engine()?.counts())
    }

    /// Number of labels ever inserted, tombstoned ones included.
    pub fn element_count(&self) -> Result<usize> {
        Ok(self.counts()?.total)
    }

    /// Number of labels not tombstoned.
    pub fn active_count(&self) -> Result<usize> {
        Ok(self.counts()?.active())
    }

    /// Number of tombstoned labels.
    pub fn deleted_count(&self) -> Result<usize> {
        Ok(self.counts()?.deleted)
    }

    /// Current capacity.
    pub fn max_elements(&self) -> Result<usize> {
        Ok(self.counts()?.capacity)
    }

    /// Every stored label, tombstoned ones included.
    pub fn ids(&self) -> Result<Vec<Label>> {
        let inner = self.read_initialized()?;
        Ok(inner.handle.engine()?.labels(false))
    }

    /// Labels that are not tombstoned.
    pub fn active_ids(&self) -> Result<Vec<Label>> {
        let inner = self.read_initialized()?;
        Ok(inner.handle.engine()?.labels(true))
    }

    /// Stored vectors for `labels`, in request order.
    ///
    /// Lenient: labels that are unknown or tombstoned are skipped, so the
    /// result may be shorter than `labels`. Use
    /// [`Index::get_data_by_label`] to see which ones were missing.
    /// Cosine indexes return the normalized vectors they store.
    pub fn get_data(&self, labels: &[Label]) -> Result<Vec<Vec<f32>>> {
        Ok(self.get_data_by_label(labels)?.into_iter().flatten().collect())
    }

    /// Stored vector for each of `labels`, `None` where a label is unknown or
    /// tombstoned.
    pub fn get_data_by_label(&self, labels: &[Label]) -> Result<Vec<Option<Vec<f32>>>> {
        let buffer = LabelBuffer::pack(labels)?;
        let inner = self.read_initialized()?;
        Ok(inner.handle.engine()?.fetch_vectors(&buffer))
    }

    /// Fixed dimension, 0 before the first insert.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.inner.read().config.dimension
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.inner.read().config.clone()
    }

    /// Returns true once [`Index::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().handle.is_closed()
    }

    /// Changes the default search breadth.
    ///
    /// The record is rewritten unless the index is read-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for 0 or [`Error::Closed`] after
    /// close.
    pub fn set_ef_search(&self, ef: usize) -> Result<()> {
        if ef == 0 {
            return Err(Error::InvalidArgument(
                "ef_search must be at least 1".to_string(),
            ));
        }
        let mut inner = self.inner.write();
        if inner.handle.is_closed() {
            return Err(Error::Closed);
        }
        inner.config.ef_search = ef;
        if !inner.config.read_only {
            if let Some(dir) = &inner.config.persist_location {
                inner.config.write_record(dir)?;
            }
        }
        Ok(())
    }
}
