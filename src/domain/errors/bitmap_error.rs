//! Read bitmap error types.

use thiserror::Error;

/// Read bitmap error variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum BitmapError {
    #[error("bit position {position} exceeds bitmap capacity of {capacity} bits")]
    IndexOutOfRange { position: usize, capacity: usize },

    #[error("invalid bitmap size {size} bytes (must be between 1 and {max})")]
    InvalidSize { size: usize, max: usize },

    #[error("bitmap size mismatch: {left} bits vs {right} bits")]
    SizeMismatch { left: usize, right: usize },
}

impl BitmapError {
    /// Creates index out of range error.
    #[must_use]
    pub const fn out_of_range(position: usize, capacity: usize) -> Self {
        Self::IndexOutOfRange { position, capacity }
    }

    /// Creates invalid size error.
    #[must_use]
    pub const fn invalid_size(size: usize, max: usize) -> Self {
        Self::InvalidSize { size, max }
    }
}
