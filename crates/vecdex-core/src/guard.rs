//! Batch label uniqueness check.

use crate::error::{Error, Result};
use crate::Label;
use rustc_hash::FxHashSet;

/// Verifies that no label appears twice in `labels`.
///
/// Only the batch itself is checked; collisions with labels already stored in
/// the engine are the engine's to report.
///
/// # Errors
///
/// Returns [`Error::DuplicateLabel`] with the first repeated label.
pub fn ensure_unique_labels(labels: &[Label]) -> Result<()> {
    let mut seen: FxHashSet<Label> =
        FxHashSet::with_capacity_and_hasher(labels.len(), Default::default());
    for &label in labels {
        if !seen.insert(label) {
            return Err(Error::DuplicateLabel(label));
        }
    }
    Ok(())
}
