//! Error types for the in-memory store.

use nestsync_core::{Key, SyncError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write addressed a row that does not exist.
    #[error("no {entity_type} row with key {key}")]
    RowNotFound {
        /// The table.
        entity_type: String,
        /// The missing key.
        key: Key,
    },

    /// An insert reused a taken key.
    #[error("duplicate key {key} in {entity_type}")]
    DuplicateKey {
        /// The table.
        entity_type: String,
        /// The taken key.
        key: Key,
    },

    /// An update or delete was given a record without a key.
    #[error("{entity_type} record has no key")]
    MissingKey {
        /// The table.
        entity_type: String,
    },
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::storage(err.to_string())
    }
}
