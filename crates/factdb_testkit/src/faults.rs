//! Failure injection for backend commits.
//!
//! [`FaultyBackend`] wraps an in-memory backend and fails the next commit
//! with a chosen error, so tests can check how the writer reacts to disk
//! errors and to corruption.

use factdb_core::backend_options;
use factdb_storage::{InMemoryBackend, KvBackend, KvSnapshot, StorageError, StorageResult, WriteBatch};
use std::io;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// An error to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// An I/O error, such as a full disk.
    Io,
    /// Stored data found corrupted.
    Corruption,
}

impl Fault {
    const fn code(self) -> u8 {
        match self {
            Self::Io => 1,
            Self::Corruption => 2,
        }
    }
}

/// An in-memory backend whose next commit can be made to fail.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    pending: AtomicU8,
    injected: AtomicUsize,
}

impl FaultyBackend {
    /// Creates an empty backend with the store's key order.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: InMemoryBackend::new(backend_options(&crate::TestStore::config())),
            pending: AtomicU8::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    /// Makes the next commit fail with `fault`. Nothing of it is applied.
    pub fn fail_next_commit(&self, fault: Fault) {
        self.pending.store(fault.code(), Ordering::SeqCst);
    }

    /// Number of commits failed so far.
    #[must_use]
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }
}

impl Default for FaultyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBackend for FaultyBackend {
    fn declare_index(&self, id: u8, name: &str) -> StorageResult<()> {
        self.inner.declare_index(id, name)
    }

    fn snapshot(&self) -> KvSnapshot {
        self.inner.snapshot()
    }

    fn commit(&self, batch: WriteBatch) -> StorageResult<u64> {
        let error = match self.pending.swap(0, Ordering::SeqCst) {
            1 => StorageError::Io(io::Error::other("disk full")),
            2 => StorageError::corrupted("injected checksum mismatch"),
            _ => return self.inner.commit(batch),
        };
        self.injected.fetch_add(1, Ordering::SeqCst);
        Err(error)
    }

    fn sequence(&self) -> u64 {
        self.inner.sequence()
    }

    fn vacuum(&self) {
        self.inner.vacuum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_applies_to_one_commit_only() {
        let backend = FaultyBackend::new();
        backend.declare_index(1, "log").unwrap();
        backend.fail_next_commit(Fault::Io);

        let mut batch = backend.create_batch();
        batch.put(vec![1, 0], Vec::new());
        assert!(matches!(backend.commit(batch.clone()), Err(StorageError::Io(_))));
        assert_eq!(backend.sequence(), 0);

        backend.commit(batch).unwrap();
        assert_eq!(backend.sequence(), 1);
        assert_eq!(backend.injected(), 1);
    }

    #[test]
    fn corruption_fault_is_a_corruption() {
        let backend = FaultyBackend::new();
        backend.fail_next_commit(Fault::Corruption);
        let err = backend.commit(backend.create_batch()).unwrap_err();
        assert!(err.is_corruption());
    }
}
