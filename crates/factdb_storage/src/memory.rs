//! In-memory storage backend for testing.

use crate::backend::{BackendOptions, KvBackend};
use crate::batch::WriteBatch;
use crate::error::StorageResult;
use crate::snapshot::KvSnapshot;
use crate::table::Table;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend keeps every version in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Example
///
/// ```rust
/// use factdb_storage::{BackendOptions, InMemoryBackend, KvBackend};
///
/// let backend = InMemoryBackend::new(BackendOptions::new());
/// backend.declare_index(1, "log").unwrap();
/// let mut batch = backend.create_batch();
/// batch.put(vec![1, 42], b"x".to_vec());
/// assert_eq!(backend.commit(batch).unwrap(), 1);
/// assert_eq!(backend.snapshot().get(&[1, 42]).unwrap().as_ref(), b"x");
/// ```
pub struct InMemoryBackend {
    table: Arc<Table>,
    commit_lock: Mutex<()>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new(options: BackendOptions) -> Self {
        Self {
            table: Arc::new(Table::new(options)),
            commit_lock: Mutex::new(()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(BackendOptions::default())
    }
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("sequence", &self.table.sequence())
            .finish()
    }
}

impl KvBackend for InMemoryBackend {
    fn declare_index(&self, id: u8, name: &str) -> StorageResult<()> {
        self.table.declare_index(id, name)
    }

    fn snapshot(&self) -> KvSnapshot {
        KvSnapshot::new(Arc::clone(&self.table))
    }

    fn commit(&self, batch: WriteBatch) -> StorageResult<u64> {
        let _guard = self.commit_lock.lock();
        self.table.validate(&batch)?;
        Ok(self.table.apply(&batch))
    }

    fn sequence(&self) -> u64 {
        self.table.sequence()
    }

    fn vacuum(&self) {
        self.table.vacuum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::default();
        backend.declare_index(1, "one").unwrap();
        backend
    }

    #[test]
    fn memory_new_is_empty() {
        let backend = backend();
        assert_eq!(backend.sequence(), 0);
        assert!(backend.snapshot().entries().is_empty());
    }

    #[test]
    fn memory_commit_bumps_sequence() {
        let backend = backend();
        let mut batch = backend.create_batch();
        batch.put(vec![1, 1], b"a".to_vec());
        assert_eq!(backend.commit(batch).unwrap(), 1);
        let mut batch = backend.create_batch();
        batch.put(vec![1, 2], b"b".to_vec());
        assert_eq!(backend.commit(batch).unwrap(), 2);
        assert_eq!(backend.sequence(), 2);
    }

    #[test]
    fn memory_rejected_batch_applies_nothing() {
        let backend = backend();
        let mut batch = backend.create_batch();
        batch.put(vec![1, 1], b"a".to_vec());
        batch.put(vec![9, 1], b"b".to_vec());
        assert!(matches!(backend.commit(batch), Err(StorageError::UnknownIndex(9))));
        assert_eq!(backend.sequence(), 0);
        assert!(backend.snapshot().get(&[1, 1]).is_none());
    }

    #[test]
    fn memory_snapshot_outlives_vacuum() {
        let backend = backend();
        let mut batch = backend.create_batch();
        batch.put(vec![1, 1], b"a".to_vec());
        backend.commit(batch).unwrap();
        let old = backend.snapshot();

        let mut batch = backend.create_batch();
        batch.put(vec![1, 1], b"b".to_vec());
        backend.commit(batch).unwrap();
        backend.vacuum();

        assert_eq!(old.get(&[1, 1]).unwrap().as_ref(), b"a");
        assert_eq!(backend.snapshot().get(&[1, 1]).unwrap().as_ref(), b"b");
    }
}
