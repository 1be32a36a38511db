//! Error types for docstore core.

use crate::entity::EntityId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docstore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docstore_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database has not been initialized yet.
    #[error("database is not initialized")]
    NotInitialized,

    /// The object was disposed and can no longer be used.
    #[error("{what} has been disposed")]
    Disposed {
        /// Which kind of object was used after disposal.
        what: &'static str,
    },

    /// A cursor was read outside of its valid range.
    #[error("cursor is not positioned on a record")]
    EndOfCursor,

    /// The operation is not supported.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// The index references a record whose data file is missing.
    #[error("data file not found for entity {id}")]
    DataNotFound {
        /// The entity whose data is missing.
        id: EntityId,
    },

    /// A stored file could not be interpreted.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a disposed error for the given kind of object.
    pub fn disposed(what: &'static str) -> Self {
        Self::Disposed { what }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for lifecycle misuse (not initialized, or disposed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::Disposed { .. })
    }

    /// Returns true for errors that mean stored data contradicts the index.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::DataNotFound { .. } | Self::InvalidFormat { .. } | Self::Codec(_)
        )
    }
}
