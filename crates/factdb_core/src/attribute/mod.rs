//! Attribute metadata and the catalog.
//!
//! Every attribute is itself an entity in [`PartitionId::ATTRIBUTE`] whose
//! counter is the attribute id. Its definition is a handful of ordinary
//! datoms using the built-in `db/*` attributes, so schema changes are
//! normalized, indexed and time-travelled like any other write.
//!
//! [`PartitionId::ATTRIBUTE`]: factdb_codec::PartitionId::ATTRIBUTE

mod catalog;
mod schema;

pub use catalog::AttributeCatalog;
pub(crate) use schema::{apply_schema_delta, definition_ops};

use factdb_codec::{AttributeId, ValueTag};
use std::fmt;

/// `db/ident`: the attribute's symbolic name.
pub const DB_IDENT: AttributeId = AttributeId::new(1);
/// `db/valueType`: tag byte of the attribute's values.
pub const DB_VALUE_TYPE: AttributeId = AttributeId::new(2);
/// `db/cardinality`: 1 for one, 2 for many.
pub const DB_CARDINALITY: AttributeId = AttributeId::new(3);
/// `db/indexed`: 1 if the attribute is in AVET.
pub const DB_INDEXED: AttributeId = AttributeId::new(4);
/// `db/unique`: 1 if values identify at most one entity.
pub const DB_UNIQUE: AttributeId = AttributeId::new(5);
/// `db/noHistory`: 1 if superseded values are not kept.
pub const DB_NO_HISTORY: AttributeId = AttributeId::new(6);
/// `db/txTimestamp`: commit time of a transaction, in microseconds.
pub const DB_TX_TIMESTAMP: AttributeId = AttributeId::new(7);

/// Whether an entity holds one or many values of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    /// A single value; asserting replaces it.
    #[default]
    One = 1,
    /// A set of values.
    Many = 2,
}

impl Cardinality {
    /// Converts the stored byte.
    #[must_use]
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::One),
            2 => Some(Self::Many),
            _ => None,
        }
    }

    /// The stored byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "one"),
            Self::Many => write!(f, "many"),
        }
    }
}

/// Per-attribute metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeRecord {
    /// Tag every value must carry.
    pub value_tag: ValueTag,
    /// One or many values per entity.
    pub cardinality: Cardinality,
    /// Whether datoms are kept in AVET.
    pub indexed: bool,
    /// Whether a value may belong to at most one entity. Implies `indexed`.
    pub unique: bool,
    /// Whether superseded values are dropped instead of moved to history.
    pub no_history: bool,
}

impl AttributeRecord {
    /// A single-valued, unindexed attribute of `value_tag`.
    #[must_use]
    pub const fn new(value_tag: ValueTag) -> Self {
        Self {
            value_tag,
            cardinality: Cardinality::One,
            indexed: false,
            unique: false,
            no_history: false,
        }
    }

    /// Makes the attribute multi-valued.
    #[must_use]
    pub const fn many(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    /// Adds the attribute to AVET.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Makes the attribute unique (and indexed).
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self.indexed = true;
        self
    }

    /// Drops superseded values instead of keeping history.
    #[must_use]
    pub const fn no_history(mut self) -> Self {
        self.no_history = true;
        self
    }

    /// Whether values are entity references.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.value_tag == ValueTag::Reference
    }

    /// Whether datoms belong in AVET.
    #[must_use]
    pub const fn in_avet(&self) -> bool {
        self.indexed || self.unique
    }

    /// The record with `unique` forcing `indexed`.
    #[must_use]
    pub const fn normalized(mut self) -> Self {
        if self.unique {
            self.indexed = true;
        }
        self
    }
}

/// The attributes every store starts with.
pub(crate) fn builtins() -> [(AttributeId, &'static str, AttributeRecord); 7] {
    [
        (DB_IDENT, "db/ident", AttributeRecord::new(ValueTag::Utf8).unique()),
        (DB_VALUE_TYPE, "db/valueType", AttributeRecord::new(ValueTag::UInt8)),
        (DB_CARDINALITY, "db/cardinality", AttributeRecord::new(ValueTag::UInt8)),
        (DB_INDEXED, "db/indexed", AttributeRecord::new(ValueTag::UInt8)),
        (DB_UNIQUE, "db/unique", AttributeRecord::new(ValueTag::UInt8)),
        (DB_NO_HISTORY, "db/noHistory", AttributeRecord::new(ValueTag::UInt8)),
        (DB_TX_TIMESTAMP, "db/txTimestamp", AttributeRecord::new(ValueTag::Int64)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_implies_indexed() {
        let record = AttributeRecord::new(ValueTag::Utf8).unique();
        assert!(record.indexed);
        assert!(record.in_avet());

        let raw = AttributeRecord {
            unique: true,
            ..AttributeRecord::new(ValueTag::Utf8)
        };
        assert!(!raw.indexed);
        assert!(raw.normalized().indexed);
    }

    #[test]
    fn cardinality_bytes() {
        assert_eq!(Cardinality::from_u8(Cardinality::Many.as_u8()), Some(Cardinality::Many));
        assert_eq!(Cardinality::from_u8(0), None);
    }

    #[test]
    fn builtin_ids_are_dense() {
        for (i, (id, _, _)) in builtins().iter().enumerate() {
            assert_eq!(usize::from(id.as_u16()), i + 1);
        }
    }
}
