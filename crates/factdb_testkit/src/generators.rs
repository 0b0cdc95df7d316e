//! Property-based test generators using proptest.
//!
//! Provides strategies for generating values, datoms and index keys that
//! respect the codec's invariants.

use factdb_codec::{AttributeId, Datom, EntityId, IndexType, PartitionId, TaggedValue, TxId};
use proptest::prelude::*;

/// Strategy for generating any tagged value.
///
/// Floats include NaN and signed zeros; strings include non-ASCII text.
pub fn tagged_value_strategy() -> impl Strategy<Value = TaggedValue> {
    prop_oneof![
        Just(TaggedValue::Null),
        any::<u8>().prop_map(TaggedValue::UInt8),
        any::<u16>().prop_map(TaggedValue::UInt16),
        any::<u32>().prop_map(TaggedValue::UInt32),
        any::<u64>().prop_map(TaggedValue::UInt64),
        any::<u128>().prop_map(TaggedValue::UInt128),
        any::<i16>().prop_map(TaggedValue::Int16),
        any::<i32>().prop_map(TaggedValue::Int32),
        any::<i64>().prop_map(TaggedValue::Int64),
        any::<i128>().prop_map(TaggedValue::Int128),
        any::<f32>().prop_map(TaggedValue::Float32),
        any::<f64>().prop_map(TaggedValue::Float64),
        "[ -~]{0,16}".prop_map(TaggedValue::Ascii),
        ".{0,16}".prop_map(TaggedValue::Utf8),
        "[a-zA-Z]{0,8}".prop_map(TaggedValue::Utf8Insensitive),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(TaggedValue::Blob),
        entity_id_strategy().prop_map(TaggedValue::Reference),
    ]
}

/// Strategy for generating text values.
pub fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Strategy for generating permanent entity ids in a few partitions.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    (
        prop_oneof![Just(PartitionId::ENTITY), (4u8..=255).prop_map(PartitionId::new)],
        1u64..1_000,
    )
        .prop_map(|(partition, counter)| EntityId::in_partition(partition, counter))
}

/// Strategy for generating user attribute ids.
pub fn attribute_id_strategy() -> impl Strategy<Value = AttributeId> {
    (8u16..64).prop_map(AttributeId::new)
}

/// Strategy for generating transaction ids.
pub fn tx_id_strategy() -> impl Strategy<Value = TxId> {
    (1u64..10_000).prop_map(TxId::from_counter)
}

/// Strategy for generating datoms, assertions and retractions alike.
pub fn datom_strategy() -> impl Strategy<Value = Datom> {
    (
        entity_id_strategy(),
        attribute_id_strategy(),
        tagged_value_strategy(),
        tx_id_strategy(),
        any::<bool>(),
    )
        .prop_map(|(entity, attribute, value, tx, retract)| {
            if retract {
                Datom::retract(entity, attribute, value, tx)
            } else {
                Datom::assert(entity, attribute, value, tx)
            }
        })
}

/// Strategy for generating an index that holds datoms.
pub fn datom_index_strategy() -> impl Strategy<Value = IndexType> {
    prop::sample::select(
        IndexType::STORED
            .iter()
            .copied()
            .filter(|index| index.holds_datoms())
            .collect::<Vec<_>>(),
    )
}

/// One step in a random edit script against a single entity.
#[derive(Debug, Clone)]
pub enum FactOp {
    /// Set the single-valued name.
    SetName(String),
    /// Retract the given name.
    RetractName(String),
    /// Add a tag.
    AddTag(String),
    /// Remove a tag.
    RemoveTag(String),
}

/// Strategy for a single edit step over a small value alphabet.
pub fn fact_op_strategy() -> impl Strategy<Value = FactOp> {
    let small = || prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_string);
    prop_oneof![
        small().prop_map(FactOp::SetName),
        small().prop_map(FactOp::RetractName),
        small().prop_map(FactOp::AddTag),
        small().prop_map(FactOp::RemoveTag),
    ]
}

/// Strategy for a script of transactions, each a short list of edits.
pub fn fact_script_strategy() -> impl Strategy<Value = Vec<Vec<FactOp>>> {
    prop::collection::vec(prop::collection::vec(fact_op_strategy(), 1..5), 1..8)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_entities_are_permanent(e in entity_id_strategy()) {
            prop_assert!(!e.is_temp());
            prop_assert!(e.partition() != PartitionId::ATTRIBUTE);
        }

        #[test]
        fn generated_indexes_hold_datoms(index in datom_index_strategy()) {
            prop_assert!(index.holds_datoms());
        }
    }
}
