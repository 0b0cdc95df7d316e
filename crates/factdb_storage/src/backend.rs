//! Storage backend trait definition.

use crate::batch::WriteBatch;
use crate::error::StorageResult;
use crate::snapshot::KvSnapshot;
use std::cmp::Ordering;
use std::fmt;

/// Total order over raw keys.
pub type KeyComparator = fn(&[u8], &[u8]) -> Ordering;

/// Returns the leading part of a key that prefix-mode iteration stays within.
pub type PrefixExtractor = fn(&[u8]) -> &[u8];

fn bytewise(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Options shared by every backend.
#[derive(Clone, Copy)]
pub struct BackendOptions {
    /// Comparator ordering the whole key space.
    pub comparator: KeyComparator,
    /// Optional prefix extractor for prefix-mode cursors.
    pub prefix_extractor: Option<PrefixExtractor>,
    /// Whether durable backends fsync on every commit.
    pub sync_on_commit: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            comparator: bytewise,
            prefix_extractor: None,
            sync_on_commit: true,
        }
    }
}

impl fmt::Debug for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendOptions")
            .field("prefix_extractor", &self.prefix_extractor.is_some())
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

impl BackendOptions {
    /// Creates options with bytewise ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key comparator.
    #[must_use]
    pub const fn comparator(mut self, comparator: KeyComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Sets the prefix extractor.
    #[must_use]
    pub const fn prefix_extractor(mut self, extractor: PrefixExtractor) -> Self {
        self.prefix_extractor = Some(extractor);
        self
    }

    /// Sets whether commits are fsynced.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// A sorted key/value backend with snapshots and atomic batches.
///
/// All indexes share one key space ordered by the configured comparator.
/// The first byte of every key names the index it belongs to, and writes
/// are only accepted for indexes that were declared.
///
/// # Invariants
///
/// - `commit` applies a batch completely or not at all
/// - a [`KvSnapshot`] never observes commits made after it was taken
/// - sequence numbers increase by one per successful commit
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - Journaled persistent storage
pub trait KvBackend: Send + Sync {
    /// Declares the index whose keys start with byte `id`.
    ///
    /// Declaring the same id with the same name again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` was declared under another name.
    fn declare_index(&self, id: u8, name: &str) -> StorageResult<()>;

    /// Returns an immutable view of the current state.
    fn snapshot(&self) -> KvSnapshot;

    /// Creates an empty batch.
    fn create_batch(&self) -> WriteBatch {
        WriteBatch::new()
    }

    /// Atomically applies a batch and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if a key targets an undeclared index or the batch
    /// cannot be made durable. Nothing is applied in that case.
    fn commit(&self, batch: WriteBatch) -> StorageResult<u64>;

    /// Sequence number of the last commit.
    fn sequence(&self) -> u64;

    /// Drops versions no live snapshot can observe.
    fn vacuum(&self);
}
