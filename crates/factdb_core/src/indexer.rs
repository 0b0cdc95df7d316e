//! Turns a normalized delta into index writes.
//!
//! | Datom               | Current indexes  | TxLog   | History indexes          |
//! |---------------------|------------------|---------|--------------------------|
//! | assert              | put              | put     | -                        |
//! | retract (superseded)| delete           | marker  | old datom + marker       |
//!
//! AVET is written only for indexed attributes and VAET only for
//! references. Attributes without history skip the history columns.

use crate::attribute::AttributeCatalog;
use crate::transaction::Delta;
use bytes::Bytes;
use factdb_codec::{blob_payload_key, Datom, IndexFamily, IndexType, TaggedValue, TxId};
use factdb_storage::{BatchOp, WriteBatch};

/// Families a datom of this attribute appears in, besides the log.
fn families(catalog: &AttributeCatalog, datom: &Datom) -> impl Iterator<Item = IndexFamily> {
    let avet = catalog.is_indexed(datom.attribute);
    let vaet = matches!(datom.value, TaggedValue::Reference(_));
    [
        Some(IndexFamily::Eavt),
        Some(IndexFamily::Aevt),
        avet.then_some(IndexFamily::Avet),
        vaet.then_some(IndexFamily::Vaet),
    ]
    .into_iter()
    .flatten()
}

fn put(batch: &mut WriteBatch, datom: &Datom, index: IndexType) {
    batch.put(datom.encode_key(index), Bytes::new());
}

/// Builds the batch for one transaction.
///
/// `backfill` comes first so the transaction's own writes win on any key
/// both touch. `catalog` must be the catalog in force after the
/// transaction, so datoms of a newly indexed attribute land in AVET.
pub(crate) fn build_batch(
    catalog: &AttributeCatalog,
    delta: &Delta,
    tx: TxId,
    backfill: Vec<BatchOp>,
) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for op in backfill {
        batch.push(op);
    }

    for old in &delta.retracts {
        let marker = old.retraction_at(tx);
        put(&mut batch, &marker, IndexType::TxLog);
        let keep_history = !catalog.is_no_history(old.attribute);
        for family in families(catalog, old) {
            batch.delete(old.encode_key(family.current()));
            if let Some(history) = family.history().filter(|_| keep_history) {
                put(&mut batch, old, history);
                put(&mut batch, &marker, history);
            }
        }
    }

    for new in &delta.asserts {
        if let (Some(hash), TaggedValue::HashedBlob(payload)) = (new.value.blob_hash(), &new.value) {
            batch.put(blob_payload_key(hash), Bytes::copy_from_slice(payload));
        }
        put(&mut batch, new, IndexType::TxLog);
        for family in families(catalog, new) {
            put(&mut batch, new, family.current());
        }
    }
    batch
}
