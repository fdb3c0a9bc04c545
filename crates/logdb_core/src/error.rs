//! Error types for LogDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in LogDB core operations.
///
/// Lookups that find nothing are not errors: reads return `None` or an
/// empty list instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] logdb_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] logdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record or query was rejected before reaching the write path.
    #[error("invalid record for table {table}: {message}")]
    Validation {
        /// Table the record was meant for.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// A unique column value is already held by another record.
    #[error("unique constraint violated in table {table}: column {column} already has value {value}")]
    UniqueViolation {
        /// Table holding the constraint.
        table: String,
        /// The unique column.
        column: String,
        /// Rendered conflicting value.
        value: String,
    },

    /// A batch could not be made durable; none of its entries were applied.
    #[error("commit of {file} in table {table} failed: {message}")]
    CommitFailed {
        /// Table the batch belonged to.
        table: String,
        /// Log file the batch targeted.
        file: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// Table not found.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// Table already registered.
    #[error("table already exists: {name}")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// Database is already open in another process.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Database has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid on-disk format.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A background task panicked or was cancelled.
    #[error("background task failed: {message}")]
    TaskFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a commit failed error.
    pub fn commit_failed(
        table: impl Into<String>,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CommitFailed {
            table: table.into(),
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            message: err.to_string(),
        }
    }
}
