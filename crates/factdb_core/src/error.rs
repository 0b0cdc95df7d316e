//! Error types for FactDB core.

use factdb_codec::{AttributeId, EntityId, PartitionId};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in FactDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("backend failure: {0}")]
    BackendFailure(#[from] factdb_storage::StorageError),

    /// Key or value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] factdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attribute id was never registered.
    #[error("unknown attribute: {id}")]
    UnknownAttribute {
        /// The attribute id.
        id: AttributeId,
    },

    /// Attribute ident was never registered.
    #[error("unknown attribute ident: {ident}")]
    UnknownAttributeIdent {
        /// The symbolic ident.
        ident: String,
    },

    /// Two entities would own the same value of a unique attribute.
    #[error("unique constraint violated on {attribute}: value {value} owned by {existing}, asserted for {conflicting}")]
    UniqueConstraintViolation {
        /// The unique attribute.
        attribute: AttributeId,
        /// Rendered value.
        value: String,
        /// Entity that already owns the value.
        existing: EntityId,
        /// Entity that tried to take it.
        conflicting: EntityId,
    },

    /// The caller stopped waiting for a commit. The transaction may still
    /// commit.
    #[error("transaction timed out after {timeout:?}")]
    TransactionTimeout {
        /// The configured timeout.
        timeout: Duration,
    },

    /// An import stream failed validation.
    #[error("corrupt import: {message}")]
    CorruptImport {
        /// Description of the problem.
        message: String,
    },

    /// A value does not match its attribute's declared type.
    #[error("value type mismatch on {attribute}: expected {expected}, got {actual}")]
    ValueTypeMismatch {
        /// The attribute.
        attribute: AttributeId,
        /// Declared tag name.
        expected: &'static str,
        /// Supplied tag name.
        actual: &'static str,
    },

    /// A temporary id was used that the transaction never issued.
    #[error("unknown temporary id: {id}")]
    UnknownTempId {
        /// The temporary id.
        id: EntityId,
    },

    /// A partition ran out of ids.
    #[error("id space exhausted in {partition}")]
    IdSpaceExhausted {
        /// The partition.
        partition: PartitionId,
    },

    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of what was invalid.
        message: String,
    },

    /// Stored indexes disagree with each other.
    #[error("index invariant violated: {message}")]
    IndexInvariant {
        /// Description of the breach.
        message: String,
    },

    /// The writer refuses further writes after a corruption.
    #[error("writes disabled: {reason}")]
    WritesDisabled {
        /// Why writes were disabled.
        reason: String,
    },

    /// The store has shut down.
    #[error("store is closed")]
    StoreClosed,
}

impl CoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a corrupt import error.
    pub fn corrupt_import(message: impl Into<String>) -> Self {
        Self::CorruptImport {
            message: message.into(),
        }
    }

    /// Creates an index invariant error.
    pub fn index_invariant(message: impl Into<String>) -> Self {
        Self::IndexInvariant {
            message: message.into(),
        }
    }

    /// Whether the error means stored data can no longer be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::BackendFailure(e) if e.is_corruption())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factdb_storage::StorageError;

    #[test]
    fn storage_corruption_is_detected() {
        let err = CoreError::from(StorageError::corrupted("bad crc"));
        assert!(err.is_corruption());
        assert!(!CoreError::StoreClosed.is_corruption());
    }

    #[test]
    fn unique_violation_names_both_entities() {
        let err = CoreError::UniqueConstraintViolation {
            attribute: AttributeId::new(9),
            value: "\"v\"".to_string(),
            existing: EntityId::in_partition(PartitionId::ENTITY, 1),
            conflicting: EntityId::in_partition(PartitionId::ENTITY, 2),
        };
        let text = err.to_string();
        assert!(text.contains("e:2:1"));
        assert!(text.contains("e:2:2"));
    }
}
