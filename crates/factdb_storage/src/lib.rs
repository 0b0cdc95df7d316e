//! # FactDB Storage
//!
//! Sorted key/value backends for FactDB.
//!
//! This crate provides the lowest-level storage abstraction for FactDB.
//! Backends hold **opaque keys and values** ordered by a pluggable
//! comparator; they know nothing about datoms.
//!
//! ## Design Principles
//!
//! - One key space; the first key byte names the index
//! - Atomic batches, numbered by a monotonically increasing sequence
//! - Snapshots pin a sequence and never observe later commits
//! - Must be `Send + Sync` for concurrent readers
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - Journaled persistent storage
//!
//! ## Example
//!
//! ```rust
//! use factdb_storage::{InMemoryBackend, KvBackend, ReadOptions};
//!
//! let backend = InMemoryBackend::default();
//! backend.declare_index(1, "log").unwrap();
//! let mut batch = backend.create_batch();
//! batch.put(vec![1, 2], b"b".to_vec());
//! batch.put(vec![1, 1], b"a".to_vec());
//! backend.commit(batch).unwrap();
//!
//! let mut cursor = backend.snapshot().cursor(ReadOptions::new());
//! cursor.seek_to_first();
//! assert_eq!(cursor.key(), Some(&[1u8, 1][..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod error;
mod file;
mod journal;
mod memory;
mod snapshot;
mod table;

pub use backend::{BackendOptions, KeyComparator, KvBackend, PrefixExtractor};
pub use batch::{BatchOp, WriteBatch};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use snapshot::{KvCursor, KvIter, KvSnapshot, ReadOptions};
