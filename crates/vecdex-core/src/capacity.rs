//! Capacity planning for inserts.
//!
//! Growth is decided before any vector crosses the boundary: the engine
//! cannot insert past its allocated capacity, so a batch is either fully
//! provisioned up front or not attempted.

use crate::error::{Error, Result};

/// Returns the capacity the engine must grow to before inserting `incoming`
/// vectors, or `None` if the current capacity suffices.
///
/// The target is `ceil(max_elements * resize_factor)`. A batch too large for
/// even that is provisioned to exactly what it needs, so one growth step is
/// always enough.
///
/// # Errors
///
/// Returns [`Error::CapacityExceeded`] if the required capacity overflows
/// `usize`.
pub fn growth_target(
    current_count: usize,
    incoming: usize,
    max_elements: usize,
    resize_factor: f64,
) -> Result<Option<usize>> {
    let required = current_count
        .checked_add(incoming)
        .ok_or_else(|| Error::CapacityExceeded {
            requested: usize::MAX,
            reason: format!("{current_count} + {incoming} elements overflows"),
        })?;

    if required <= max_elements {
        return Ok(None);
    }

    Ok(Some(scaled(max_elements, resize_factor)?.max(required)))
}

/// Computes `ceil(capacity * factor)`, never less than `capacity + 1`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scaled(capacity: usize, factor: f64) -> Result<usize> {
    let target = (capacity as f64 * factor).ceil();
    if !target.is_finite() || target >= usize::MAX as f64 {
        return Err(Error::CapacityExceeded {
            requested: usize::MAX,
            reason: format!("{capacity} * {factor} is not a representable capacity"),
        });
    }
    Ok((target as usize).max(capacity + 1))
}

/// Checks that an explicit resize does not shrink the index.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `requested < current`.
pub fn ensure_monotonic(current: usize, requested: usize) -> Result<()> {
    if requested < current {
        return Err(Error::InvalidArgument(format!(
            "new capacity {requested} is smaller than current capacity {current}"
        )));
    }
    Ok(())
}
