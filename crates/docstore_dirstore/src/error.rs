//! Error types for the directory store.

use docstore_core::CoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for directory store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in directory store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error from the underlying collection.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An archive could not be turned into an entity.
    #[error("not importable: {reason}")]
    NotImportable {
        /// Why the import was rejected.
        reason: String,
    },

    /// A managed directory operation could not be carried out.
    #[error("storage error at {}: {message}", path.display())]
    Storage {
        /// The directory involved.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

impl StoreError {
    /// Creates a not-importable error.
    pub fn not_importable(reason: impl Into<String>) -> Self {
        Self::NotImportable {
            reason: reason.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_display_transparently() {
        let err = StoreError::from(CoreError::NotInitialized);
        assert_eq!(err.to_string(), "database is not initialized");
    }

    #[test]
    fn not_importable_message() {
        let err = StoreError::not_importable("empty archive");
        assert_eq!(err.to_string(), "not importable: empty archive");
    }
}
