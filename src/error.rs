//! Error types for persistent collection operations.
//!
//! Every fallible operation in this crate reports failure through
//! [`CollectionError`]. Failures are detected before any node is cloned,
//! so a failed call leaves the receiver and every other value intact.

use thiserror::Error;

/// Represents errors that can occur when operating on a collection.
///
/// # Examples
///
/// ```rust
/// use imshare::CollectionError;
/// use imshare::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (1..=3).collect();
/// let error = vector.try_get(3).unwrap_err();
///
/// assert_eq!(error, CollectionError::IndexOutOfRange { index: 3, length: 3 });
/// assert_eq!(format!("{error}"), "index 3 is out of range for length 3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CollectionError {
    /// An index was outside `[0, length)`, or an element was popped from an
    /// empty vector.
    #[error("index {index} is out of range for length {length}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The length of the collection at the time of the call.
        length: usize,
    },

    /// A key required to be present was absent.
    #[error("key not found")]
    KeyNotFound,

    /// A transient was used after it was committed or abandoned.
    #[error("transient has already been committed or abandoned")]
    StaleTransient,
}

impl CollectionError {
    /// Creates an [`IndexOutOfRange`](Self::IndexOutOfRange) error.
    #[inline]
    #[must_use]
    pub const fn index_out_of_range(index: usize, length: usize) -> Self {
        Self::IndexOutOfRange { index, length }
    }
}
