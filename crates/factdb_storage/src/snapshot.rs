//! Snapshots and cursors.

use crate::table::Table;
use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

struct Lease {
    table: Arc<Table>,
    seq: u64,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.table.release(self.seq);
    }
}

/// An immutable view of a backend at one sequence number.
///
/// Cloning is cheap. The view stays valid while any clone is alive; the
/// backend reclaims old versions once the last clone is dropped.
#[derive(Clone)]
pub struct KvSnapshot {
    lease: Arc<Lease>,
}

impl KvSnapshot {
    pub(crate) fn new(table: Arc<Table>) -> Self {
        let seq = table.acquire();
        Self {
            lease: Arc::new(Lease { table, seq }),
        }
    }

    fn table(&self) -> &Table {
        &self.lease.table
    }

    /// Sequence number this snapshot observes.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.lease.seq
    }

    /// Point lookup.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.table().get(key, self.lease.seq)
    }

    /// Opens a cursor. The cursor starts unpositioned.
    #[must_use]
    pub fn cursor(&self, options: ReadOptions) -> KvCursor {
        KvCursor {
            snapshot: self.clone(),
            options,
            current: None,
            prefix: None,
        }
    }

    /// Iterates `[lower, upper)` in comparator order.
    #[must_use]
    pub fn range(&self, lower: &[u8], upper: &[u8]) -> KvIter {
        let mut cursor = self.cursor(
            ReadOptions::new()
                .lower_bound(lower.to_vec())
                .upper_bound(upper.to_vec()),
        );
        cursor.seek_to_first();
        cursor.into_forward()
    }

    /// Every visible entry, in comparator order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Vec<u8>, Bytes)> {
        self.table().entries_at(self.lease.seq)
    }
}

impl fmt::Debug for KvSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvSnapshot")
            .field("sequence", &self.lease.seq)
            .finish()
    }
}

/// Cursor options.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Inclusive lower bound.
    pub lower_bound: Option<Vec<u8>>,
    /// Exclusive upper bound.
    pub upper_bound: Option<Vec<u8>>,
    /// Stop once keys leave the prefix of the seek target.
    pub prefix_mode: bool,
}

impl ReadOptions {
    /// Total-order iteration without bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn lower_bound(mut self, key: Vec<u8>) -> Self {
        self.lower_bound = Some(key);
        self
    }

    /// Sets the exclusive upper bound.
    #[must_use]
    pub fn upper_bound(mut self, key: Vec<u8>) -> Self {
        self.upper_bound = Some(key);
        self
    }

    /// Enables prefix mode. Has no effect without a prefix extractor.
    #[must_use]
    pub fn prefix_mode(mut self) -> Self {
        self.prefix_mode = true;
        self
    }
}

/// A bidirectional cursor over a [`KvSnapshot`].
///
/// Each step is a fresh ordered lookup against the snapshot's sequence
/// number, so the cursor holds no lock between steps.
pub struct KvCursor {
    snapshot: KvSnapshot,
    options: ReadOptions,
    current: Option<(Vec<u8>, Bytes)>,
    prefix: Option<Vec<u8>>,
}

impl KvCursor {
    fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.snapshot.table().options().comparator)(a, b)
    }

    fn capture_prefix(&mut self, key: &[u8]) {
        self.prefix = match (self.options.prefix_mode, self.snapshot.table().options().prefix_extractor) {
            (true, Some(extract)) => Some(extract(key).to_vec()),
            _ => None,
        };
    }

    fn in_bounds(&self, key: &[u8]) -> bool {
        if let Some(lower) = &self.options.lower_bound {
            if self.cmp(key, lower) == Ordering::Less {
                return false;
            }
        }
        if let Some(upper) = &self.options.upper_bound {
            if self.cmp(key, upper) != Ordering::Less {
                return false;
            }
        }
        match (&self.prefix, self.snapshot.table().options().prefix_extractor) {
            (Some(prefix), Some(extract)) => extract(key) == prefix.as_slice(),
            _ => true,
        }
    }

    fn land(&mut self, found: Option<(Vec<u8>, Bytes)>) {
        self.current = found.filter(|(key, _)| self.in_bounds(key));
    }

    /// Positions at the first key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.capture_prefix(target);
        let start = match &self.options.lower_bound {
            Some(lower) if self.cmp(target, lower) == Ordering::Less => lower.clone(),
            _ => target.to_vec(),
        };
        let found = self
            .snapshot
            .table()
            .next_visible(Bound::Included(&start), self.snapshot.sequence());
        self.land(found);
    }

    /// Positions at the last key at or before `target`.
    pub fn seek_for_prev(&mut self, target: &[u8]) {
        self.capture_prefix(target);
        let found = match &self.options.upper_bound {
            Some(upper) if self.cmp(target, upper) != Ordering::Less => self
                .snapshot
                .table()
                .prev_visible(Bound::Excluded(upper), self.snapshot.sequence()),
            _ => self
                .snapshot
                .table()
                .prev_visible(Bound::Included(target), self.snapshot.sequence()),
        };
        self.land(found);
    }

    /// Positions at the first key within bounds.
    pub fn seek_to_first(&mut self) {
        let seq = self.snapshot.sequence();
        let found = match &self.options.lower_bound {
            Some(lower) => self.snapshot.table().next_visible(Bound::Included(lower), seq),
            None => self.snapshot.table().next_visible(Bound::Unbounded, seq),
        };
        if let Some((key, _)) = &found {
            let key = key.clone();
            self.capture_prefix(&key);
        }
        self.land(found);
    }

    /// Positions at the last key within bounds.
    pub fn seek_to_last(&mut self) {
        let seq = self.snapshot.sequence();
        let found = match &self.options.upper_bound {
            Some(upper) => self.snapshot.table().prev_visible(Bound::Excluded(upper), seq),
            None => self.snapshot.table().prev_visible(Bound::Unbounded, seq),
        };
        if let Some((key, _)) = &found {
            let key = key.clone();
            self.capture_prefix(&key);
        }
        self.land(found);
    }

    /// Moves to the next key. Does nothing when not positioned.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            let found = self
                .snapshot
                .table()
                .next_visible(Bound::Excluded(&key), self.snapshot.sequence());
            self.land(found);
        }
    }

    /// Moves to the previous key. Does nothing when not positioned.
    pub fn prev(&mut self) {
        if let Some((key, _)) = self.current.take() {
            let found = self
                .snapshot
                .table()
                .prev_visible(Bound::Excluded(&key), self.snapshot.sequence());
            self.land(found);
        }
    }

    /// Whether the cursor is positioned on an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Current key.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> Option<&Bytes> {
        self.current.as_ref().map(|(_, v)| v)
    }

    /// Turns the cursor into a forward iterator starting at its position.
    #[must_use]
    pub fn into_forward(self) -> KvIter {
        KvIter {
            cursor: self,
            started: false,
        }
    }
}

/// Forward iterator built from a positioned [`KvCursor`].
pub struct KvIter {
    cursor: KvCursor,
    started: bool,
}

impl Iterator for KvIter {
    type Item = (Vec<u8>, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            self.cursor.next();
        }
        self.started = true;
        self.cursor.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::{BackendOptions, InMemoryBackend, KvBackend, ReadOptions};

    fn two_byte_prefix(key: &[u8]) -> &[u8] {
        &key[..key.len().min(2)]
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new(BackendOptions::new().prefix_extractor(two_byte_prefix));
        backend.declare_index(b'a', "a").unwrap();
        backend.declare_index(b'b', "b").unwrap();
        let mut batch = backend.create_batch();
        for key in ["a1", "a2", "a3", "b1", "b2"] {
            batch.put(key.as_bytes().to_vec(), key.as_bytes().to_vec());
        }
        backend.commit(batch).unwrap();
        backend
    }

    fn keys(iter: impl Iterator<Item = (Vec<u8>, bytes::Bytes)>) -> Vec<String> {
        iter.map(|(k, _)| String::from_utf8(k).unwrap()).collect()
    }

    #[test]
    fn range_is_half_open() {
        let snap = backend().snapshot();
        assert_eq!(keys(snap.range(b"a2", b"b1")), vec!["a2", "a3"]);
    }

    #[test]
    fn seek_and_step_both_ways() {
        let snap = backend().snapshot();
        let mut cursor = snap.cursor(ReadOptions::new());
        cursor.seek(b"a25");
        assert_eq!(cursor.key(), Some(&b"a3"[..]));
        cursor.prev();
        assert_eq!(cursor.key(), Some(&b"a2"[..]));
        cursor.seek_for_prev(b"b0");
        assert_eq!(cursor.key(), Some(&b"a3"[..]));
        cursor.seek_to_last();
        assert_eq!(cursor.key(), Some(&b"b2"[..]));
        cursor.next();
        assert!(!cursor.valid());
    }

    #[test]
    fn prefix_mode_stops_at_prefix_change() {
        let snap = backend().snapshot();
        let mut cursor = snap.cursor(ReadOptions::new().prefix_mode());
        cursor.seek(b"a2");
        assert_eq!(keys(cursor.into_forward()), vec!["a2"]);
    }

    #[test]
    fn bounds_clamp_seek_targets() {
        let snap = backend().snapshot();
        let mut cursor = snap.cursor(
            ReadOptions::new()
                .lower_bound(b"a2".to_vec())
                .upper_bound(b"b2".to_vec()),
        );
        cursor.seek(b"a0");
        assert_eq!(cursor.key(), Some(&b"a2"[..]));
        cursor.seek_for_prev(b"z");
        assert_eq!(cursor.key(), Some(&b"b1"[..]));
    }

    #[test]
    fn snapshot_ignores_later_commits() {
        let backend = backend();
        let before = backend.snapshot();
        let mut batch = backend.create_batch();
        batch.delete(b"a1".to_vec());
        batch.put(b"a4".to_vec(), b"a4".to_vec());
        backend.commit(batch).unwrap();

        assert!(before.get(b"a1").is_some());
        assert!(before.get(b"a4").is_none());
        let after = backend.snapshot();
        assert!(after.get(b"a1").is_none());
        assert_eq!(after.get(b"a4").unwrap().as_ref(), b"a4");
    }
}
