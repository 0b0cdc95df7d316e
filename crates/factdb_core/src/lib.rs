//! # FactDB Core
//!
//! An embedded, append-only datom store.
//!
//! Every fact is an immutable `(entity, attribute, value, tx, op)` tuple.
//! The store keeps the current state in four sorted index families (EAVT,
//! AEVT, AVET, VAET), moves superseded facts to matching history indexes,
//! and logs every change in transaction order. Any past transaction can be
//! read back as it stood.
//!
//! ## Write path
//!
//! ```text
//! Transaction ─► expand functions ─► normalize ─► remap temp ids
//!             ─► schema delta ─► build batch ─► KvBackend::commit
//! ```
//!
//! One writer thread applies transactions in order; callers await a
//! [`StoreResult`] carrying the new [`Snapshot`].
//!
//! ## Read path
//!
//! A [`Snapshot`] is immutable. [`View::Current`] reads the current
//! indexes, [`View::AsOf`] merges current and history up to a transaction,
//! and [`View::History`] returns every assertion and retraction.
//! [`Store::revisions`] yields each newly committed snapshot.
//!
//! ## Modules
//!
//! - `attribute` - attribute records and the catalog
//! - `allocator` - id counters and temp id remapping
//! - `transaction` - transactions, functions and normalization
//! - `indexer` - delta to index writes
//! - `snapshot` - views, slices and the time-travel merge
//! - `writer` - the single writer
//! - `export` - chunked export and import

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod attribute;
mod config;
mod error;
mod export;
mod indexer;
mod snapshot;
mod store;
mod transaction;
mod writer;

pub use attribute::{
    AttributeCatalog, AttributeRecord, Cardinality, DB_CARDINALITY, DB_IDENT, DB_INDEXED,
    DB_NO_HISTORY, DB_TX_TIMESTAMP, DB_UNIQUE, DB_VALUE_TYPE,
};
pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use export::{ExportSummary, ImportSummary, EXPORT_MAGIC, EXPORT_VERSION, MAX_CHUNK_ENTRIES};
pub use snapshot::{family_names, SliceDescriptor, Snapshot, View};
pub use store::{backend_options, SchemaChange, Store, StoreResult};
pub use transaction::{
    AttrRef, PendingEntity, ScanAction, ScanUpdate, Transaction, TxContext, TxFunction,
};

pub use factdb_codec as codec;
