//! Key encoding and comparator properties.

use factdb_codec::{compare_keys, split_key, Datom, RawDatom};
use factdb_testkit::prelude::*;
use proptest::prelude::*;
use std::cmp::Ordering;

proptest! {
    #[test]
    fn keys_decode_to_the_encoded_datom(d in datom_strategy(), index in datom_index_strategy()) {
        let key = d.encode_key(index);
        let (decoded_index, body) = split_key(&key).unwrap();
        prop_assert_eq!(decoded_index, index);
        let back = RawDatom::decode(body).unwrap().into_datom(None).unwrap();
        prop_assert_eq!(back, d);
    }

    #[test]
    fn comparator_is_antisymmetric(
        a in datom_strategy(),
        b in datom_strategy(),
        index in datom_index_strategy(),
    ) {
        let (ka, kb) = (a.encode_key(index), b.encode_key(index));
        prop_assert_eq!(compare_keys(&ka, &kb), compare_keys(&kb, &ka).reverse());
    }

    #[test]
    fn comparator_equality_is_datom_equality(
        a in datom_strategy(),
        b in datom_strategy(),
        index in datom_index_strategy(),
    ) {
        let equal = compare_keys(&a.encode_key(index), &b.encode_key(index)) == Ordering::Equal;
        prop_assert_eq!(equal, a == b);
        prop_assert_eq!(compare_keys(&a.encode_key(index), &a.encode_key(index)), Ordering::Equal);
    }

    #[test]
    fn comparator_is_transitive(
        datoms in prop::collection::vec(datom_strategy(), 3),
        index in datom_index_strategy(),
    ) {
        let keys: Vec<Vec<u8>> = datoms.iter().map(|d| d.encode_key(index)).collect();
        for a in &keys {
            for b in &keys {
                for c in &keys {
                    if compare_keys(a, b).is_le() && compare_keys(b, c).is_le() {
                        prop_assert!(compare_keys(a, c).is_le());
                    }
                }
            }
        }
    }

    #[test]
    fn key_order_follows_value_order(
        e in entity_id_strategy(),
        a in attribute_id_strategy(),
        tx in tx_id_strategy(),
        v1 in tagged_value_strategy(),
        v2 in tagged_value_strategy(),
        index in datom_index_strategy(),
    ) {
        let k1 = Datom::assert(e, a, v1.clone(), tx).encode_key(index);
        let k2 = Datom::assert(e, a, v2.clone(), tx).encode_key(index);
        prop_assert_eq!(compare_keys(&k1, &k2), v1.cmp(&v2));
    }

    #[test]
    fn indexes_never_interleave(
        a in datom_strategy(),
        b in datom_strategy(),
        ia in datom_index_strategy(),
        ib in datom_index_strategy(),
    ) {
        prop_assume!(ia != ib);
        prop_assert_eq!(
            compare_keys(&a.encode_key(ia), &b.encode_key(ib)),
            ia.as_byte().cmp(&ib.as_byte())
        );
    }
}

#[test]
fn sorted_keys_stay_sorted_after_decoding() {
    use factdb_codec::{AttributeId, EntityId, IndexType, PartitionId, TaggedValue, TxId};

    let e = |n| EntityId::in_partition(PartitionId::ENTITY, n);
    let mut keys: Vec<Vec<u8>> = [
        Datom::assert(e(2), AttributeId::new(9), TaggedValue::Int64(-5), TxId::from_counter(3)),
        Datom::assert(e(1), AttributeId::new(9), TaggedValue::Int64(7), TxId::from_counter(2)),
        Datom::assert(e(1), AttributeId::new(9), TaggedValue::Int64(-7), TxId::from_counter(4)),
        Datom::retract(e(1), AttributeId::new(9), TaggedValue::Int64(-7), TxId::from_counter(4)),
    ]
    .iter()
    .map(|d| d.encode_key(IndexType::EAVTHistory))
    .collect();
    keys.sort_by(|a, b| compare_keys(a, b));

    let decoded: Vec<(u64, i64, bool)> = keys
        .iter()
        .map(|k| {
            let (_, body) = split_key(k).unwrap();
            let d = RawDatom::decode(body).unwrap().into_datom(None).unwrap();
            (d.entity.counter(), d.value.as_i64().unwrap(), d.is_retract)
        })
        .collect();
    assert_eq!(decoded, vec![(1, -7, false), (1, -7, true), (1, 7, false), (2, -5, false)]);
}
