//! Error types shared across the execution core.
//!
//! A field failure must be observable from every consumer of that field, so
//! failures are stored and cloned as [`SharedError`] values. The concrete
//! error type is preserved behind the `Arc` and remains reachable through
//! [`std::error::Error::source`] or downcasting.

use std::sync::Arc;

/// A cloneable, shareable error.
///
/// Once a producer fails, the same failure is handed to every waiter of every
/// affected slot, however many times it is read.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wraps a concrete error into a [`SharedError`].
pub fn shared<E>(error: E) -> SharedError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Errors raised by [`crate::Cell`] operations.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// The requested slot count is outside the supported range.
    #[error("number of slots must be between 1 and {max}, got {requested}")]
    InvalidSlotCount { requested: usize, max: usize },

    /// A read or write addressed a slot the cell does not have.
    #[error("slot index {slot} is out of bounds for a cell with {size} slots")]
    SlotOutOfBounds { slot: usize, size: usize },

    /// A producer set the same slot twice.
    #[error("slot {slot} is already set")]
    SlotAlreadySet { slot: usize },

    /// A producer returned without setting every slot. `mask` has one bit per
    /// slot, lowest bit first.
    #[error("producer did not set all {size} slots, set slots: {mask:b}")]
    UnsetSlots { size: usize, mask: u32 },

    /// `compute_if_unclaimed` found the cell already claimed.
    #[error("cell is already claimed: {label}")]
    AlreadyClaimed { label: String },

    /// The producer task was cancelled before it settled its slots.
    #[error("producer was cancelled before completing")]
    Cancelled,

    /// Every writer disappeared before the slot was settled.
    #[error("cell was dropped before its slots were settled")]
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_slots_reports_binary_mask() {
        let error = CellError::UnsetSlots {
            size: 3,
            mask: 0b101,
        };
        assert!(error.to_string().contains("set slots: 101"));
    }

    #[test]
    fn shared_error_preserves_downcast() {
        let error = shared(CellError::Cancelled);
        assert!(error.downcast_ref::<CellError>().is_some());
    }
}
