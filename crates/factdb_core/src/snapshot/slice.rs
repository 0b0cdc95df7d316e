//! Slice descriptors: which part of which index family to read.

use factdb_codec::{
    AttributeId, EntityId, IndexFamily, IndexType, KeyPrefix, PartitionId, TaggedValue, TxId,
    ValueTag,
};

/// Builds a key body. A missing value encodes as the smallest possible one.
fn body(entity: u64, attribute: u16, value: Option<&TaggedValue>, tx: u64, retract: bool) -> Vec<u8> {
    let prefix = KeyPrefix {
        entity: EntityId::new(entity),
        attribute: AttributeId::new(attribute),
        tx: TxId::new(tx),
        is_retract: retract,
        value_tag: value.map_or(ValueTag::Null.as_byte(), |v| v.tag().as_byte()),
    };
    let mut out = Vec::with_capacity(32);
    prefix.write_to(&mut out);
    if let Some(v) = value {
        v.write_key_bytes(&mut out);
    }
    out
}

/// Lowest body with these leading fields.
fn low(entity: u64, attribute: u16, value: Option<&TaggedValue>, tx: u64) -> Vec<u8> {
    body(entity, attribute, value, tx, false)
}

/// A body above every real datom with the same value: no stored datom has
/// the maximum tx id with the retract flag set.
fn top(entity: u64, attribute: u16, value: &TaggedValue) -> Vec<u8> {
    body(entity, attribute, Some(value), u64::MAX, true)
}

/// A contiguous range of one index family.
///
/// Bounds are key bodies (without the index byte) and are valid for both
/// the current and history variant of the family. `upper` is exclusive; a
/// missing upper bound runs to the end of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceDescriptor {
    family: IndexFamily,
    lower: Vec<u8>,
    upper: Option<Vec<u8>>,
}

impl SliceDescriptor {
    fn new(family: IndexFamily, lower: Vec<u8>, upper: Option<Vec<u8>>) -> Self {
        Self {
            family,
            lower,
            upper,
        }
    }

    /// Every datom of `entity` (EAVT).
    #[must_use]
    pub fn entity(entity: EntityId) -> Self {
        let e = entity.as_u64();
        Self::new(
            IndexFamily::Eavt,
            low(e, 0, None, 0),
            e.checked_add(1).map(|next| low(next, 0, None, 0)),
        )
    }

    /// Every value of `attribute` on `entity` (EAVT).
    #[must_use]
    pub fn entity_attribute(entity: EntityId, attribute: AttributeId) -> Self {
        let (e, a) = (entity.as_u64(), attribute.as_u16());
        let upper = match a.checked_add(1) {
            Some(next) => Some(low(e, next, None, 0)),
            None => e.checked_add(1).map(|next| low(next, 0, None, 0)),
        };
        Self::new(IndexFamily::Eavt, low(e, a, None, 0), upper)
    }

    /// One fact across transactions (EAVT).
    #[must_use]
    pub fn entity_attribute_value(entity: EntityId, attribute: AttributeId, value: &TaggedValue) -> Self {
        let (e, a) = (entity.as_u64(), attribute.as_u16());
        Self::new(
            IndexFamily::Eavt,
            low(e, a, Some(value), 0),
            Some(top(e, a, value)),
        )
    }

    /// Every datom of `attribute` (AEVT).
    #[must_use]
    pub fn attribute(attribute: AttributeId) -> Self {
        let a = attribute.as_u16();
        Self::new(
            IndexFamily::Aevt,
            low(0, a, None, 0),
            a.checked_add(1).map(|next| low(0, next, None, 0)),
        )
    }

    /// Entities holding `value` for `attribute` (AVET).
    #[must_use]
    pub fn attribute_value(attribute: AttributeId, value: &TaggedValue) -> Self {
        let a = attribute.as_u16();
        Self::new(
            IndexFamily::Avet,
            low(0, a, Some(value), 0),
            Some(top(u64::MAX, a, value)),
        )
    }

    /// Datoms whose value references `target` (VAET).
    #[must_use]
    pub fn references(target: EntityId) -> Self {
        let value = TaggedValue::Reference(target);
        Self::new(
            IndexFamily::Vaet,
            low(0, 0, Some(&value), 0),
            Some(top(u64::MAX, u16::MAX, &value)),
        )
    }

    /// Everything written by `tx` (TxLog).
    #[must_use]
    pub fn tx(tx: TxId) -> Self {
        let t = tx.as_u64();
        Self::new(
            IndexFamily::TxLog,
            low(0, 0, None, t),
            t.checked_add(1).map(|next| low(0, 0, None, next)),
        )
    }

    /// Every entity in `partition` (EAVT).
    #[must_use]
    pub fn partition(partition: PartitionId) -> Self {
        Self::new(
            IndexFamily::Eavt,
            low(partition.min_id(), 0, None, 0),
            partition
                .max_id()
                .checked_add(1)
                .map(|next| low(next, 0, None, 0)),
        )
    }

    /// A whole index family.
    #[must_use]
    pub fn all(family: IndexFamily) -> Self {
        Self::new(family, Vec::new(), None)
    }

    /// The family this slice reads.
    #[must_use]
    pub fn family(&self) -> IndexFamily {
        self.family
    }

    /// Full-key bounds of this slice in `index`.
    pub(crate) fn bounds(&self, index: IndexType) -> (Vec<u8>, Vec<u8>) {
        let byte = index.as_byte();
        let mut lower = Vec::with_capacity(1 + self.lower.len());
        lower.push(byte);
        lower.extend_from_slice(&self.lower);
        let upper = match &self.upper {
            Some(body) => {
                let mut upper = Vec::with_capacity(1 + body.len());
                upper.push(byte);
                upper.extend_from_slice(body);
                upper
            }
            None => vec![byte + 1],
        };
        (lower, upper)
    }
}
