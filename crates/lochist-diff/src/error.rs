//! Error types for the diff crate.

use lochist_types::ObjectId;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A tree referenced during the diff was not found in the store.
    #[error("object not found: {0:?}")]
    ObjectNotFound(ObjectId),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] lochist_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
