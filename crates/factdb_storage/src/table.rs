//! Multi-version sorted table shared by the backends.
//!
//! Every key maps to a list of versions in ascending sequence order. A
//! version with no value is a tombstone. A snapshot at sequence `s` sees,
//! for each key, the newest version with `seq <= s`.
//!
//! Lock order is `state` before `live`.

use crate::backend::{BackendOptions, KeyComparator};
use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Clone)]
struct OrderedKey {
    bytes: Vec<u8>,
    cmp: KeyComparator,
}

impl OrderedKey {
    fn probe(bytes: &[u8], cmp: KeyComparator) -> Self {
        Self {
            bytes: bytes.to_vec(),
            cmp,
        }
    }
}

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.cmp)(&self.bytes, &other.bytes)
    }
}

#[derive(Debug, Clone)]
struct Version {
    seq: u64,
    value: Option<Bytes>,
}

fn visible(versions: &[Version], seq: u64) -> Option<&Bytes> {
    versions
        .iter()
        .rev()
        .find(|v| v.seq <= seq)
        .and_then(|v| v.value.as_ref())
}

/// Drops versions older than the newest one at or below `horizon`.
/// Returns true if nothing visible remains.
fn prune(versions: &mut Vec<Version>, horizon: u64) -> bool {
    if let Some(keep_from) = versions.iter().rposition(|v| v.seq <= horizon) {
        versions.drain(..keep_from);
        if versions.first().is_some_and(|v| v.value.is_none()) {
            versions.remove(0);
        }
    }
    versions.is_empty()
}

#[derive(Default)]
struct TableState {
    entries: BTreeMap<OrderedKey, Vec<Version>>,
    sequence: u64,
}

pub(crate) struct Table {
    options: BackendOptions,
    state: RwLock<TableState>,
    live: Mutex<BTreeMap<u64, usize>>,
    indexes: RwLock<BTreeMap<u8, String>>,
}

impl Table {
    pub(crate) fn new(options: BackendOptions) -> Self {
        Self {
            options,
            state: RwLock::new(TableState::default()),
            live: Mutex::new(BTreeMap::new()),
            indexes: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn options(&self) -> &BackendOptions {
        &self.options
    }

    pub(crate) fn declare_index(&self, id: u8, name: &str) -> StorageResult<()> {
        let mut indexes = self.indexes.write();
        match indexes.get(&id) {
            Some(existing) if existing != name => Err(StorageError::IndexConflict {
                id,
                existing: existing.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                indexes.insert(id, name.to_string());
                Ok(())
            }
        }
    }

    pub(crate) fn validate(&self, batch: &WriteBatch) -> StorageResult<()> {
        let indexes = self.indexes.read();
        for op in batch.ops() {
            let id = op.key().first().copied().ok_or(StorageError::UnknownIndex(0))?;
            if !indexes.contains_key(&id) {
                return Err(StorageError::UnknownIndex(id));
            }
        }
        Ok(())
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// Registers a snapshot at the current sequence and returns it.
    pub(crate) fn acquire(&self) -> u64 {
        let state = self.state.read();
        let seq = state.sequence;
        *self.live.lock().entry(seq).or_insert(0) += 1;
        seq
    }

    pub(crate) fn release(&self, seq: u64) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                live.remove(&seq);
            }
        }
    }

    fn horizon(&self, current: u64) -> u64 {
        self.live
            .lock()
            .keys()
            .next()
            .copied()
            .map_or(current, |oldest| oldest.min(current))
    }

    /// Applies a validated batch at the next sequence number.
    pub(crate) fn apply(&self, batch: &WriteBatch) -> u64 {
        self.apply_with(batch, None)
    }

    /// Applies a batch at an explicit sequence number (journal replay).
    pub(crate) fn apply_at(&self, batch: &WriteBatch, seq: u64) {
        self.apply_with(batch, Some(seq));
    }

    fn apply_with(&self, batch: &WriteBatch, seq: Option<u64>) -> u64 {
        let mut state = self.state.write();
        let seq = seq.unwrap_or(state.sequence + 1);
        let cmp = self.options.comparator;
        let mut touched: Vec<OrderedKey> = Vec::with_capacity(batch.len());

        if batch.clears() {
            for versions in state.entries.values_mut() {
                push_version(versions, seq, None);
            }
        }

        for op in batch.ops() {
            let key = OrderedKey::probe(op.key(), cmp);
            match op {
                BatchOp::Put { value, .. } => {
                    let versions = state.entries.entry(key.clone()).or_default();
                    push_version(versions, seq, Some(value.clone()));
                }
                BatchOp::Delete { .. } => match state.entries.get_mut(&key) {
                    Some(versions) => push_version(versions, seq, None),
                    None => continue,
                },
            }
            touched.push(key);
        }

        state.sequence = seq;
        let horizon = self.horizon(seq);
        if batch.clears() {
            state.entries.retain(|_, versions| !prune(versions, horizon));
        } else {
            for key in touched {
                let empty = state
                    .entries
                    .get_mut(&key)
                    .is_some_and(|versions| prune(versions, horizon));
                if empty {
                    state.entries.remove(&key);
                }
            }
        }
        seq
    }

    pub(crate) fn vacuum(&self) {
        let mut state = self.state.write();
        let horizon = self.horizon(state.sequence);
        state.entries.retain(|_, versions| !prune(versions, horizon));
    }

    pub(crate) fn get(&self, key: &[u8], seq: u64) -> Option<Bytes> {
        let state = self.state.read();
        let probe = OrderedKey::probe(key, self.options.comparator);
        state
            .entries
            .get(&probe)
            .and_then(|versions| visible(versions, seq).cloned())
    }

    /// First visible entry after `from`.
    pub(crate) fn next_visible(&self, from: Bound<&[u8]>, seq: u64) -> Option<(Vec<u8>, Bytes)> {
        let state = self.state.read();
        let start = self.bound(from);
        state
            .entries
            .range((start, Bound::Unbounded))
            .find_map(|(k, versions)| visible(versions, seq).map(|v| (k.bytes.clone(), v.clone())))
    }

    /// Last visible entry before `to`.
    pub(crate) fn prev_visible(&self, to: Bound<&[u8]>, seq: u64) -> Option<(Vec<u8>, Bytes)> {
        let state = self.state.read();
        let end = self.bound(to);
        state
            .entries
            .range((Bound::Unbounded, end))
            .rev()
            .find_map(|(k, versions)| visible(versions, seq).map(|v| (k.bytes.clone(), v.clone())))
    }

    /// Every visible entry at `seq`, in order.
    pub(crate) fn entries_at(&self, seq: u64) -> Vec<(Vec<u8>, Bytes)> {
        let state = self.state.read();
        state
            .entries
            .iter()
            .filter_map(|(k, versions)| visible(versions, seq).map(|v| (k.bytes.clone(), v.clone())))
            .collect()
    }

    fn bound(&self, bound: Bound<&[u8]>) -> Bound<OrderedKey> {
        let cmp = self.options.comparator;
        match bound {
            Bound::Included(k) => Bound::Included(OrderedKey::probe(k, cmp)),
            Bound::Excluded(k) => Bound::Excluded(OrderedKey::probe(k, cmp)),
            Bound::Unbounded => Bound::Unbounded,
        }
    }

    #[cfg(test)]
    pub(crate) fn version_count(&self) -> usize {
        self.state.read().entries.values().map(Vec::len).sum()
    }
}

fn push_version(versions: &mut Vec<Version>, seq: u64, value: Option<Bytes>) {
    match versions.last_mut() {
        Some(last) if last.seq == seq => last.value = value,
        _ => versions.push(Version { seq, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let table = Table::new(BackendOptions::default());
        table.declare_index(b'k', "keys").unwrap();
        table
    }

    fn put(table: &Table, key: &[u8], value: &'static [u8]) -> u64 {
        let mut batch = WriteBatch::new();
        batch.put(key.to_vec(), Bytes::from_static(value));
        table.apply(&batch)
    }

    #[test]
    fn unpinned_versions_are_pruned() {
        let t = table();
        let s1 = put(&t, b"k1", b"a");
        let s2 = put(&t, b"k1", b"b");
        assert!(s2 > s1);
        assert_eq!(t.get(b"k1", s2).unwrap(), Bytes::from_static(b"b"));
        // No snapshot pinned s1, so only the newest version survives.
        assert_eq!(t.version_count(), 1);
    }

    #[test]
    fn live_snapshot_pins_versions() {
        let t = table();
        put(&t, b"k1", b"a");
        let pinned = t.acquire();
        put(&t, b"k1", b"b");
        assert_eq!(t.get(b"k1", pinned).unwrap(), Bytes::from_static(b"a"));
        t.release(pinned);
        t.vacuum();
        assert_eq!(t.version_count(), 1);
    }

    #[test]
    fn delete_hides_key_and_is_pruned() {
        let t = table();
        put(&t, b"k1", b"a");
        let mut batch = WriteBatch::new();
        batch.delete(b"k1".to_vec());
        let seq = t.apply(&batch);
        assert!(t.get(b"k1", seq).is_none());
        assert_eq!(t.version_count(), 0);
    }

    #[test]
    fn undeclared_index_is_rejected() {
        let t = table();
        let mut batch = WriteBatch::new();
        batch.put(b"x1".to_vec(), Bytes::new());
        assert!(matches!(t.validate(&batch), Err(StorageError::UnknownIndex(b'x'))));
    }

    #[test]
    fn redeclaring_with_other_name_conflicts() {
        let t = table();
        assert!(t.declare_index(b'k', "keys").is_ok());
        assert!(t.declare_index(b'k', "other").is_err());
    }

    #[test]
    fn clear_tombstones_everything() {
        let t = table();
        put(&t, b"k1", b"a");
        put(&t, b"k2", b"b");
        let pinned = t.acquire();
        let mut batch = WriteBatch::new();
        batch.clear_all();
        batch.put(b"k3".to_vec(), Bytes::from_static(b"c"));
        let seq = t.apply(&batch);
        assert!(t.get(b"k1", seq).is_none());
        assert!(t.get(b"k1", pinned).is_some());
        assert_eq!(t.entries_at(seq).len(), 1);
        t.release(pinned);
    }
}
