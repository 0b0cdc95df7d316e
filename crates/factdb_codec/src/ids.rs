//! Identifier types.
//!
//! Every 64-bit identifier carries its partition in the top byte, so the
//! partition of an id can be read from the raw integer alone:
//!
//! ```text
//! | partition (8 bits) | counter (56 bits) |
//! ```
//!
//! Temporary ids live in [`PartitionId::TEMP`] and additionally encode the
//! partition they will be allocated into once the transaction commits:
//!
//! ```text
//! | 0x03 | unused (8) | target partition (8) | sequence (40) |
//! ```

use std::fmt;

/// Number of bits the partition is shifted by inside an id.
pub const PARTITION_SHIFT: u32 = 56;

/// Mask selecting the counter bits of an id.
pub const COUNTER_MASK: u64 = (1 << PARTITION_SHIFT) - 1;

const TEMP_TARGET_SHIFT: u32 = 40;
const TEMP_SEQUENCE_MASK: u64 = (1 << TEMP_TARGET_SHIFT) - 1;

/// A namespace for identifier ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(pub u8);

impl PartitionId {
    /// Attribute definitions. The counter is the attribute id.
    pub const ATTRIBUTE: Self = Self(0);
    /// Transaction entities.
    pub const TRANSACTIONS: Self = Self(1);
    /// Default partition for application entities.
    pub const ENTITY: Self = Self(2);
    /// Transaction-scoped temporary ids. Never written to an index.
    pub const TEMP: Self = Self(3);

    /// Creates a partition id.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the raw partition byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the partition encoded in a raw id.
    #[must_use]
    pub const fn of(raw: u64) -> Self {
        Self((raw >> PARTITION_SHIFT) as u8)
    }

    /// Builds a raw id from a counter value.
    #[must_use]
    pub const fn make_id(self, counter: u64) -> u64 {
        ((self.0 as u64) << PARTITION_SHIFT) | (counter & COUNTER_MASK)
    }

    /// Smallest raw id in this partition.
    #[must_use]
    pub const fn min_id(self) -> u64 {
        self.make_id(0)
    }

    /// Largest raw id in this partition.
    #[must_use]
    pub const fn max_id(self) -> u64 {
        self.make_id(COUNTER_MASK)
    }

    /// Returns true for partitions above the reserved range.
    #[must_use]
    pub const fn is_user(self) -> bool {
        self.0 > Self::TEMP.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part:{}", self.0)
    }
}

/// Identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Placeholder that resolves to the committing transaction's own id.
    pub const THIS_TX: Self = Self(PartitionId::TEMP.min_id());

    /// Creates an entity id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds an id in `partition` from a counter value.
    #[must_use]
    pub const fn in_partition(partition: PartitionId, counter: u64) -> Self {
        Self(partition.make_id(counter))
    }

    /// Builds a temporary id that will be allocated into `target`.
    #[must_use]
    pub const fn temp(target: PartitionId, sequence: u64) -> Self {
        Self(
            PartitionId::TEMP.min_id()
                | ((target.0 as u64) << TEMP_TARGET_SHIFT)
                | (sequence & TEMP_SEQUENCE_MASK),
        )
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the partition of this id.
    #[must_use]
    pub const fn partition(self) -> PartitionId {
        PartitionId::of(self.0)
    }

    /// Returns the counter bits of this id.
    #[must_use]
    pub const fn counter(self) -> u64 {
        self.0 & COUNTER_MASK
    }

    /// Returns true if this id is a temporary id.
    #[must_use]
    pub const fn is_temp(self) -> bool {
        self.partition().0 == PartitionId::TEMP.0
    }

    /// For a temporary id, the partition it will be allocated into.
    #[must_use]
    pub const fn temp_target(self) -> PartitionId {
        PartitionId(((self.0 >> TEMP_TARGET_SHIFT) & 0xFF) as u8)
    }

    /// For a temporary id, its per-transaction sequence number.
    #[must_use]
    pub const fn temp_sequence(self) -> u64 {
        self.0 & TEMP_SEQUENCE_MASK
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::THIS_TX {
            return write!(f, "e:this-tx");
        }
        if self.is_temp() {
            return write!(f, "e:temp:{}:{}", self.temp_target().0, self.temp_sequence());
        }
        write!(f, "e:{}:{}", self.partition().0, self.counter())
    }
}

/// Identifier of a transaction.
///
/// Transaction ids live in [`PartitionId::TRANSACTIONS`] and are also the
/// entity id of the transaction's own metadata datoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u64);

impl TxId {
    /// The smallest transaction id.
    pub const MIN: Self = Self(PartitionId::TRANSACTIONS.min_id());
    /// The largest transaction id.
    pub const MAX: Self = Self(PartitionId::TRANSACTIONS.max_id());

    /// Creates a transaction id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds a transaction id from a counter value.
    #[must_use]
    pub const fn from_counter(counter: u64) -> Self {
        Self(PartitionId::TRANSACTIONS.make_id(counter))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the counter bits of this id.
    #[must_use]
    pub const fn counter(self) -> u64 {
        self.0 & COUNTER_MASK
    }

    /// Returns this transaction as an entity id.
    #[must_use]
    pub const fn as_entity(self) -> EntityId {
        EntityId(self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.counter())
    }
}

impl From<TxId> for EntityId {
    fn from(tx: TxId) -> Self {
        tx.as_entity()
    }
}

/// Dense numeric id of an attribute.
///
/// Id 0 is reserved and never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeId(pub u16);

impl AttributeId {
    /// Creates an attribute id.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// The entity holding this attribute's definition datoms.
    #[must_use]
    pub const fn entity_id(self) -> EntityId {
        EntityId::in_partition(PartitionId::ATTRIBUTE, self.0 as u64)
    }

    /// Recovers the attribute id from a definition entity, if it is one.
    #[must_use]
    pub fn from_entity(entity: EntityId) -> Option<Self> {
        if entity.partition() != PartitionId::ATTRIBUTE {
            return None;
        }
        u16::try_from(entity.counter()).ok().map(Self)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_top_byte() {
        let id = EntityId::in_partition(PartitionId::new(7), 42);
        assert_eq!(id.as_u64() >> 56, 7);
        assert_eq!(id.partition(), PartitionId::new(7));
        assert_eq!(id.counter(), 42);
    }

    #[test]
    fn temp_ids_encode_target_partition() {
        let id = EntityId::temp(PartitionId::ENTITY, 9);
        assert!(id.is_temp());
        assert_eq!(id.temp_target(), PartitionId::ENTITY);
        assert_eq!(id.temp_sequence(), 9);
        assert_ne!(id, EntityId::THIS_TX);
    }

    #[test]
    fn this_tx_sentinel_is_temp() {
        assert!(EntityId::THIS_TX.is_temp());
        assert_eq!(EntityId::THIS_TX.temp_sequence(), 0);
    }

    #[test]
    fn tx_ids_order_by_counter() {
        assert!(TxId::from_counter(1) < TxId::from_counter(2));
        assert_eq!(TxId::from_counter(5).counter(), 5);
        assert_eq!(format!("{}", TxId::from_counter(5)), "tx:5");
    }

    #[test]
    fn attribute_entity_round_trip() {
        let attr = AttributeId::new(12);
        assert_eq!(AttributeId::from_entity(attr.entity_id()), Some(attr));
        assert_eq!(AttributeId::from_entity(EntityId::in_partition(PartitionId::ENTITY, 12)), None);
    }

    #[test]
    fn user_partitions() {
        assert!(!PartitionId::TEMP.is_user());
        assert!(PartitionId::new(4).is_user());
    }
}
