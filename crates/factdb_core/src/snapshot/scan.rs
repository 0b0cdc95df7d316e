//! Raw index scans over a backend snapshot.

use super::slice::SliceDescriptor;
use crate::error::CoreResult;
use factdb_codec::{
    blob_payload_key, split_key, CodecError, Datom, IndexType, PrefixView, RawDatom, TxId,
};
use factdb_storage::{KvSnapshot, ReadOptions};

/// A decoded index entry. The body is kept for merging.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub body: Vec<u8>,
    pub datom: Datom,
}

/// Decodes a key body, fetching the payload of hashed blobs.
fn decode_body(kv: &KvSnapshot, body: &[u8]) -> CoreResult<Datom> {
    let raw = RawDatom::decode(body)?;
    let payload = match raw.blob_hash() {
        Some(hash) => Some(
            kv.get(&blob_payload_key(hash))
                .ok_or(CodecError::MissingBlobPayload { hash })?,
        ),
        None => None,
    };
    Ok(raw.into_datom(payload.as_deref())?)
}

/// Every entry of `slice` in `index`, in index order.
pub(crate) fn scan(kv: &KvSnapshot, index: IndexType, slice: &SliceDescriptor) -> CoreResult<Vec<Entry>> {
    let (lower, upper) = slice.bounds(index);
    let mut out = Vec::new();
    for (key, _) in kv.range(&lower, &upper) {
        let (_, body) = split_key(&key)?;
        let datom = decode_body(kv, body)?;
        out.push(Entry {
            body: body.to_vec(),
            datom,
        });
    }
    Ok(out)
}

/// Number of keys stored in `index`.
pub(crate) fn count(kv: &KvSnapshot, index: IndexType) -> usize {
    let byte = index.as_byte();
    kv.range(&[byte], &[byte + 1]).count()
}

/// The newest transaction in the log.
pub(crate) fn last_tx(kv: &KvSnapshot) -> Option<TxId> {
    let byte = IndexType::TxLog.as_byte();
    let mut cursor = kv.cursor(
        ReadOptions::new()
            .lower_bound(vec![byte])
            .upper_bound(vec![byte + 1]),
    );
    cursor.seek_to_last();
    let body = cursor.key()?.get(1..)?;
    PrefixView::parse(body).map(|view| TxId::new(view.tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use factdb_codec::{
        compare_keys, key_prefix, AttributeId, EntityId, IndexFamily, PartitionId, TaggedValue,
    };
    use factdb_storage::{BackendOptions, InMemoryBackend, KvBackend};

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new(
            BackendOptions::new()
                .comparator(compare_keys)
                .prefix_extractor(key_prefix),
        );
        for index in IndexType::STORED {
            backend.declare_index(index.as_byte(), index.name()).unwrap();
        }
        backend
    }

    #[test]
    fn hashed_blob_reads_back_payload() {
        let backend = backend();
        let payload = vec![7u8; 4096];
        let datom = Datom::assert(
            EntityId::in_partition(PartitionId::ENTITY, 1),
            AttributeId::new(9),
            TaggedValue::HashedBlob(payload.clone()),
            TxId::from_counter(2),
        );
        let mut batch = backend.create_batch();
        batch.put(datom.encode_key(IndexType::EAVTCurrent), Vec::new());
        batch.put(blob_payload_key(datom.value.blob_hash().unwrap()), payload.clone());
        backend.commit(batch).unwrap();

        let entries = scan(
            &backend.snapshot(),
            IndexType::EAVTCurrent,
            &SliceDescriptor::all(IndexFamily::Eavt),
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].datom.value, TaggedValue::HashedBlob(payload));
    }

    #[test]
    fn missing_payload_is_an_error() {
        let backend = backend();
        let datom = Datom::assert(
            EntityId::in_partition(PartitionId::ENTITY, 1),
            AttributeId::new(9),
            TaggedValue::HashedBlob(vec![1, 2, 3]),
            TxId::from_counter(2),
        );
        let mut batch = backend.create_batch();
        batch.put(datom.encode_key(IndexType::EAVTCurrent), Vec::new());
        backend.commit(batch).unwrap();

        let result = scan(
            &backend.snapshot(),
            IndexType::EAVTCurrent,
            &SliceDescriptor::all(IndexFamily::Eavt),
        );
        assert!(result.is_err());
    }

    #[test]
    fn last_tx_reads_the_log_tail() {
        let backend = backend();
        assert_eq!(last_tx(&backend.snapshot()), None);
        let mut batch = backend.create_batch();
        for counter in [3, 1, 2] {
            let d = Datom::assert(
                EntityId::in_partition(PartitionId::ENTITY, 1),
                AttributeId::new(9),
                TaggedValue::from(1u8),
                TxId::from_counter(counter),
            );
            batch.put(d.encode_key(IndexType::TxLog), Vec::new());
        }
        backend.commit(batch).unwrap();
        assert_eq!(last_tx(&backend.snapshot()), Some(TxId::from_counter(3)));
        assert_eq!(count(&backend.snapshot(), IndexType::TxLog), 3);
    }
}
