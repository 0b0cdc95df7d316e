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

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A key was written to an index that was never declared.
    #[error("unknown index: {0}")]
    UnknownIndex(u8),

    /// An index id was declared twice with different names.
    #[error("index {id} already declared as {existing}")]
    IndexConflict {
        /// The index id.
        id: u8,
        /// The name it was first declared with.
        existing: String,
    },

    /// Another process holds the storage directory.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Whether this error means the stored data can no longer be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }
}
