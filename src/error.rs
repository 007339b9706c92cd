//! Error taxonomy shared by the map, its cursors and its views.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MapError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Strict lookup found no value under the composite key.
    #[error("composite key not found")]
    KeyNotFound,

    /// A must-be-new insert hit an existing composite key.
    #[error("composite key already present")]
    DuplicateKey,

    /// The map changed structurally after a cursor captured its version.
    #[error("map was modified while a cursor was active")]
    Modified,

    /// A read-only projection view was asked to mutate.
    #[error("operation not supported on a read-only view")]
    ReadOnly,

    /// Bulk export target cannot hold every element.
    #[error("destination too small: need {needed} slots, {available} available")]
    DestinationTooSmall { needed: usize, available: usize },

    /// Internal bookkeeping no longer matches the stored entries.
    #[error("invariant violated: {0}")]
    InvariantViolated(&'static str),
}
