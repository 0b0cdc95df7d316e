//! Write batches.

use bytes::Bytes;

/// One operation in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// Full key, index byte first.
        key: Vec<u8>,
        /// Stored value.
        value: Bytes,
    },
    /// Remove a key.
    Delete {
        /// Full key, index byte first.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// The key this operation targets.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered set of writes applied atomically by
/// [`KvBackend::commit`](crate::KvBackend::commit).
///
/// Operations apply in insertion order, so a later put of the same key
/// wins over an earlier delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    clear_all: bool,
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a put.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Adds a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// Appends a prepared operation.
    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    /// Removes every existing key before this batch's operations apply.
    pub fn clear_all(&mut self) {
        self.clear_all = true;
    }

    /// Whether the batch clears the store first.
    #[must_use]
    pub fn clears(&self) -> bool {
        self.clear_all
    }

    /// The operations in order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch does nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && !self.clear_all
    }
}
