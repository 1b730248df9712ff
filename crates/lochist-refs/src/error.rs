//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The tag name is invalid.
    #[error("invalid tag name: {name:?}: {reason}")]
    InvalidTagName { name: String, reason: String },

    /// A ref file on disk could not be decoded.
    #[error("corrupt ref file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
