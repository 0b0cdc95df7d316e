//! # FactDB Codec
//!
//! Binary layout of datom keys and the comparator family that orders them.
//!
//! Every index entry is a single key:
//!
//! ```text
//! | index (1) | KeyPrefix (20) | value key bytes (variable) |
//! ```
//!
//! The [`KeyPrefix`] is fixed-width and big-endian, so most fields compare
//! correctly as raw bytes. Each index orders the same fields differently;
//! [`compare_keys`] dispatches on the leading index byte so that all
//! indexes can share one physical sorted space.
//!
//! ## Usage
//!
//! ```
//! use factdb_codec::{
//!     compare_keys, AttributeId, Datom, EntityId, IndexType, PartitionId, TaggedValue, TxId,
//! };
//!
//! let e = EntityId::in_partition(PartitionId::ENTITY, 1);
//! let a = Datom::assert(e, AttributeId::new(10), TaggedValue::from("a"), TxId::from_counter(2));
//! let b = Datom::assert(e, AttributeId::new(10), TaggedValue::from("b"), TxId::from_counter(1));
//!
//! // EAVT orders by value before transaction.
//! let ka = a.encode_key(IndexType::EAVTCurrent);
//! let kb = b.encode_key(IndexType::EAVTCurrent);
//! assert!(compare_keys(&ka, &kb).is_lt());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compare;
mod datom;
mod error;
mod ids;
mod index;
mod prefix;
mod value;

pub use compare::{
    comparator_for, compare_aevt, compare_avet, compare_bytes, compare_eavt, compare_keys,
    compare_txlog, compare_vaet, key_prefix, KeyComparator,
};
pub use datom::{blob_payload_key, split_key, Datom, RawDatom};
pub use error::{CodecError, CodecResult};
pub use ids::{AttributeId, EntityId, PartitionId, TxId, COUNTER_MASK, PARTITION_SHIFT};
pub use index::{IndexFamily, IndexType};
pub use prefix::{KeyPrefix, PrefixView, FLAG_RETRACT, KEY_PREFIX_SIZE};
pub use value::{compare_value_bytes, content_hash, TaggedValue, ValueTag, BLOB_HASH_SIZE};
