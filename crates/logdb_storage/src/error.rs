//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file name cannot be used inside a store.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// A write was refused by the backend.
    #[error("write to {name} failed: {message}")]
    WriteFailed {
        /// Target file name.
        name: String,
        /// Description of the failure.
        message: String,
    },
}
