//! Schema changes carried by ordinary transactions.
//!
//! Definition datoms on attribute entities are normalized like any other
//! write. After normalization the writer hands the delta here to work out
//! the resulting catalog and any index backfill the change requires. The
//! new catalog is only published once the batch commits.

use super::catalog::AttributeCatalog;
use super::{
    AttributeRecord, Cardinality, DB_CARDINALITY, DB_IDENT, DB_INDEXED, DB_NO_HISTORY, DB_UNIQUE,
    DB_VALUE_TYPE,
};
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{scan, SliceDescriptor, Snapshot};
use crate::transaction::Delta;
use factdb_codec::{AttributeId, Datom, EntityId, IndexType, PartitionId, TaggedValue, ValueTag};
use factdb_storage::BatchOp;
use std::collections::{BTreeMap, BTreeSet};

/// Catalog and index work produced by a schema change.
#[derive(Debug)]
pub(crate) struct SchemaOutcome {
    /// Catalog to publish once the batch commits.
    pub catalog: AttributeCatalog,
    /// Index maintenance written ahead of the transaction's own datoms.
    pub backfill: Vec<BatchOp>,
}

/// Definition facts for `id`, as `(attribute, value)` pairs on
/// `id.entity_id()`.
pub(crate) fn definition_ops(
    id: AttributeId,
    ident: &str,
    record: AttributeRecord,
) -> Vec<(EntityId, AttributeId, TaggedValue)> {
    let record = record.normalized();
    let e = id.entity_id();
    vec![
        (e, DB_IDENT, TaggedValue::from(ident)),
        (e, DB_VALUE_TYPE, TaggedValue::UInt8(record.value_tag.as_byte())),
        (e, DB_CARDINALITY, TaggedValue::UInt8(record.cardinality.as_u8())),
        (e, DB_INDEXED, TaggedValue::from(record.indexed)),
        (e, DB_UNIQUE, TaggedValue::from(record.unique)),
        (e, DB_NO_HISTORY, TaggedValue::from(record.no_history)),
    ]
}

/// Definition of one attribute while a delta is folded into it.
#[derive(Debug, Default)]
struct Draft {
    ident: Option<String>,
    value_tag: Option<ValueTag>,
    cardinality: Cardinality,
    indexed: bool,
    unique: bool,
    no_history: bool,
}

impl Draft {
    fn from_catalog(catalog: &AttributeCatalog, id: AttributeId) -> Self {
        match catalog.lookup(id) {
            Ok(record) => Self {
                ident: catalog.ident(id).map(str::to_string),
                value_tag: Some(record.value_tag),
                cardinality: record.cardinality,
                indexed: record.indexed,
                unique: record.unique,
                no_history: record.no_history,
            },
            Err(_) => Self::default(),
        }
    }

    fn retract(&mut self, datom: &Datom) {
        match datom.attribute {
            a if a == DB_IDENT => self.ident = None,
            a if a == DB_VALUE_TYPE => self.value_tag = None,
            a if a == DB_CARDINALITY => self.cardinality = Cardinality::One,
            a if a == DB_INDEXED => self.indexed = false,
            a if a == DB_UNIQUE => self.unique = false,
            a if a == DB_NO_HISTORY => self.no_history = false,
            _ => {}
        }
    }

    fn assert(&mut self, id: AttributeId, datom: &Datom) -> CoreResult<()> {
        let byte = |d: &Datom| -> CoreResult<u8> {
            match d.value {
                TaggedValue::UInt8(b) => Ok(b),
                ref other => Err(CoreError::invalid_operation(format!(
                    "{} of {id} must be a u8, got {other}",
                    d.attribute
                ))),
            }
        };
        let flag = |d: &Datom| -> CoreResult<bool> {
            match byte(d)? {
                0 => Ok(false),
                1 => Ok(true),
                b => Err(CoreError::invalid_operation(format!(
                    "{} of {id} must be 0 or 1, got {b}",
                    d.attribute
                ))),
            }
        };
        match datom.attribute {
            a if a == DB_IDENT => {
                let ident = datom.value.as_str().filter(|s| !s.is_empty()).ok_or_else(|| {
                    CoreError::invalid_operation(format!("db/ident of {id} must be a non-empty string"))
                })?;
                self.ident = Some(ident.to_string());
            }
            a if a == DB_VALUE_TYPE => {
                let b = byte(datom)?;
                self.value_tag = Some(ValueTag::from_byte(b).ok_or_else(|| {
                    CoreError::invalid_operation(format!("unknown value type {b} for {id}"))
                })?);
            }
            a if a == DB_CARDINALITY => {
                let b = byte(datom)?;
                self.cardinality = Cardinality::from_u8(b).ok_or_else(|| {
                    CoreError::invalid_operation(format!("invalid cardinality {b} for {id}"))
                })?;
            }
            a if a == DB_INDEXED => self.indexed = flag(datom)?,
            a if a == DB_UNIQUE => self.unique = flag(datom)?,
            a if a == DB_NO_HISTORY => self.no_history = flag(datom)?,
            _ => {}
        }
        Ok(())
    }

    fn finish(self, id: AttributeId) -> CoreResult<(String, AttributeRecord)> {
        let ident = self
            .ident
            .ok_or_else(|| CoreError::invalid_operation(format!("{id} would have no db/ident")))?;
        let value_tag = self
            .value_tag
            .ok_or_else(|| CoreError::invalid_operation(format!("{id} would have no db/valueType")))?;
        let record = AttributeRecord {
            value_tag,
            cardinality: self.cardinality,
            indexed: self.indexed,
            unique: self.unique,
            no_history: self.no_history,
        };
        Ok((ident, record.normalized()))
    }
}

/// Folds the definition datoms of `delta` into a copy of `catalog`.
///
/// Returns `None` when the delta touches no attribute entity.
///
/// # Errors
///
/// Rejects value type changes, incomplete definitions, narrowing to
/// cardinality one while an entity holds several values, and enabling
/// uniqueness over values already shared by two entities.
pub(crate) fn apply_schema_delta(
    catalog: &AttributeCatalog,
    snapshot: &Snapshot,
    delta: &Delta,
) -> CoreResult<Option<SchemaOutcome>> {
    let in_schema = |d: &&Datom| d.entity.partition() == PartitionId::ATTRIBUTE;
    let touched: BTreeSet<EntityId> = delta
        .retracts
        .iter()
        .chain(&delta.asserts)
        .filter(in_schema)
        .map(|d| d.entity)
        .collect();
    if touched.is_empty() {
        return Ok(None);
    }

    let mut next = catalog.clone();
    let mut backfill = Vec::new();
    for entity in touched {
        let id = AttributeId::from_entity(entity)
            .filter(|id| id.as_u16() != 0)
            .ok_or_else(|| CoreError::invalid_operation(format!("{entity} is not an attribute entity")))?;

        let mut draft = Draft::from_catalog(catalog, id);
        for d in delta.retracts.iter().filter(|d| d.entity == entity) {
            draft.retract(d);
        }
        for d in delta.asserts.iter().filter(|d| d.entity == entity) {
            draft.assert(id, d)?;
        }
        let (ident, record) = draft.finish(id)?;

        if let Ok(old) = catalog.lookup(id) {
            let old = *old;
            if old.value_tag != record.value_tag {
                return Err(CoreError::invalid_operation(format!(
                    "cannot change value type of {id} from {} to {}",
                    old.value_tag, record.value_tag
                )));
            }
            check_transition(snapshot, id, &old, &record)?;
            backfill.extend(avet_backfill(snapshot, id, &old, &record)?);
        }
        tracing::debug!(attribute = %id, ident = %ident, "schema updated");
        next.insert(id, &ident, record);
    }

    Ok(Some(SchemaOutcome {
        catalog: next,
        backfill,
    }))
}

fn current_datoms(snapshot: &Snapshot, id: AttributeId) -> CoreResult<Vec<Datom>> {
    Ok(scan(snapshot.kv(), IndexType::AEVTCurrent, &SliceDescriptor::attribute(id))?
        .into_iter()
        .map(|e| e.datom)
        .collect())
}

fn check_transition(
    snapshot: &Snapshot,
    id: AttributeId,
    old: &AttributeRecord,
    new: &AttributeRecord,
) -> CoreResult<()> {
    let narrowing = old.cardinality == Cardinality::Many && new.cardinality == Cardinality::One;
    let becoming_unique = !old.unique && new.unique;
    if !narrowing && !becoming_unique {
        return Ok(());
    }
    let datoms = current_datoms(snapshot, id)?;

    if narrowing {
        // AEVT groups an entity's values together.
        if let Some(pair) = datoms.windows(2).find(|w| w[0].entity == w[1].entity) {
            return Err(CoreError::invalid_operation(format!(
                "cannot make {id} single-valued: {} holds several values",
                pair[0].entity
            )));
        }
    }

    if becoming_unique {
        let mut owners: BTreeMap<&TaggedValue, EntityId> = BTreeMap::new();
        for d in &datoms {
            if let Some(existing) = owners.insert(&d.value, d.entity) {
                if existing != d.entity {
                    return Err(CoreError::UniqueConstraintViolation {
                        attribute: id,
                        value: d.value.to_string(),
                        existing,
                        conflicting: d.entity,
                    });
                }
            }
        }
    }
    Ok(())
}

/// AVET puts or deletes for an attribute entering or leaving the index.
fn avet_backfill(
    snapshot: &Snapshot,
    id: AttributeId,
    old: &AttributeRecord,
    new: &AttributeRecord,
) -> CoreResult<Vec<BatchOp>> {
    let slice = SliceDescriptor::attribute(id);
    let mut ops = Vec::new();
    match (old.in_avet(), new.in_avet()) {
        (false, true) => {
            for (from, to) in [
                (IndexType::AEVTCurrent, IndexType::AVETCurrent),
                (IndexType::AEVTHistory, IndexType::AVETHistory),
            ] {
                for entry in scan(snapshot.kv(), from, &slice)? {
                    ops.push(BatchOp::Put {
                        key: entry.datom.encode_key(to),
                        value: bytes::Bytes::new(),
                    });
                }
            }
            tracing::info!(attribute = %id, entries = ops.len(), "backfilling AVET");
        }
        (true, false) => {
            for index in [IndexType::AVETCurrent, IndexType::AVETHistory] {
                let (lower, upper) = slice.bounds(index);
                for (key, _) in snapshot.kv().range(&lower, &upper) {
                    ops.push(BatchOp::Delete { key });
                }
            }
            tracing::info!(attribute = %id, entries = ops.len(), "dropping AVET entries");
        }
        _ => {}
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factdb_codec::{compare_keys, key_prefix, TxId};
    use factdb_storage::{BackendOptions, InMemoryBackend, KvBackend};
    use std::sync::Arc;

    const NAME: AttributeId = AttributeId::new(8);

    fn e(n: u64) -> EntityId {
        EntityId::in_partition(PartitionId::ENTITY, n)
    }

    fn tx(n: u64) -> TxId {
        TxId::from_counter(n)
    }

    fn catalog() -> AttributeCatalog {
        let mut catalog = AttributeCatalog::with_builtins();
        catalog.insert(NAME, "person/name", AttributeRecord::new(ValueTag::Utf8).many());
        catalog
    }

    fn snapshot_with(datoms: &[Datom]) -> Snapshot {
        let backend = InMemoryBackend::new(
            BackendOptions::new()
                .comparator(compare_keys)
                .prefix_extractor(key_prefix),
        );
        for index in IndexType::STORED {
            backend.declare_index(index.as_byte(), index.name()).unwrap();
        }
        let mut batch = backend.create_batch();
        for d in datoms {
            let (current, history) = if d.is_retract {
                (None, Some(IndexType::AEVTHistory))
            } else {
                (Some(IndexType::AEVTCurrent), None)
            };
            for index in current.into_iter().chain(history) {
                batch.put(d.encode_key(index), Vec::new());
            }
        }
        backend.commit(batch).unwrap();
        Snapshot::new(backend.snapshot(), Arc::new(catalog()), tx(1))
    }

    fn flag(attribute: AttributeId, on: bool) -> Delta {
        let entity = NAME.entity_id();
        Delta {
            retracts: vec![Datom::retract(entity, attribute, TaggedValue::from(!on), tx(1))],
            asserts: vec![Datom::assert(entity, attribute, TaggedValue::from(on), tx(5))],
        }
    }

    #[test]
    fn definition_ops_describe_the_record() {
        let ops = definition_ops(NAME, "person/name", AttributeRecord::new(ValueTag::Utf8).unique());
        assert_eq!(ops.len(), 6);
        assert!(ops.iter().all(|(entity, _, _)| *entity == NAME.entity_id()));
        assert!(ops.contains(&(NAME.entity_id(), DB_INDEXED, TaggedValue::UInt8(1))));
    }

    #[test]
    fn data_only_delta_is_not_a_schema_change() {
        let delta = Delta {
            retracts: Vec::new(),
            asserts: vec![Datom::assert(e(1), NAME, TaggedValue::from("a"), tx(2))],
        };
        assert!(apply_schema_delta(&catalog(), &snapshot_with(&[]), &delta)
            .unwrap()
            .is_none());
    }

    #[test]
    fn new_attribute_enters_the_catalog() {
        let id = AttributeId::new(9);
        let asserts = definition_ops(id, "person/age", AttributeRecord::new(ValueTag::Int64))
            .into_iter()
            .map(|(e, a, v)| Datom::assert(e, a, v, tx(2)))
            .collect();
        let delta = Delta {
            retracts: Vec::new(),
            asserts,
        };
        let outcome = apply_schema_delta(&catalog(), &snapshot_with(&[]), &delta)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.catalog.resolve("person/age").unwrap(), id);
        assert!(outcome.backfill.is_empty());
    }

    #[test]
    fn incomplete_definition_is_rejected() {
        let id = AttributeId::new(9);
        let delta = Delta {
            retracts: Vec::new(),
            asserts: vec![Datom::assert(id.entity_id(), DB_IDENT, TaggedValue::from("x"), tx(2))],
        };
        assert!(apply_schema_delta(&catalog(), &snapshot_with(&[]), &delta).is_err());
    }

    #[test]
    fn value_type_change_is_rejected() {
        let entity = NAME.entity_id();
        let delta = Delta {
            retracts: vec![Datom::retract(
                entity,
                DB_VALUE_TYPE,
                TaggedValue::UInt8(ValueTag::Utf8.as_byte()),
                tx(1),
            )],
            asserts: vec![Datom::assert(
                entity,
                DB_VALUE_TYPE,
                TaggedValue::UInt8(ValueTag::Int64.as_byte()),
                tx(5),
            )],
        };
        let err = apply_schema_delta(&catalog(), &snapshot_with(&[]), &delta).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn indexing_backfills_current_and_history() {
        let old = Datom::assert(e(1), NAME, TaggedValue::from("old"), tx(2));
        let stored = [
            old.clone(),
            old.retraction_at(tx(3)),
            Datom::assert(e(1), NAME, TaggedValue::from("new"), tx(3)),
        ];
        let outcome = apply_schema_delta(&catalog(), &snapshot_with(&stored), &flag(DB_INDEXED, true))
            .unwrap()
            .unwrap();
        assert!(outcome.catalog.is_indexed(NAME));
        let keys: Vec<&[u8]> = outcome.backfill.iter().map(BatchOp::key).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&stored[2].encode_key(IndexType::AVETCurrent).as_slice()));
        assert!(keys.contains(&stored[1].encode_key(IndexType::AVETHistory).as_slice()));
    }

    #[test]
    fn unique_over_shared_values_is_rejected() {
        let stored = [
            Datom::assert(e(1), NAME, TaggedValue::from("same"), tx(2)),
            Datom::assert(e(2), NAME, TaggedValue::from("same"), tx(2)),
        ];
        let err = apply_schema_delta(&catalog(), &snapshot_with(&stored), &flag(DB_UNIQUE, true))
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueConstraintViolation { attribute, .. } if attribute == NAME));
    }

    #[test]
    fn narrowing_cardinality_checks_existing_values() {
        let stored = [
            Datom::assert(e(1), NAME, TaggedValue::from("a"), tx(2)),
            Datom::assert(e(1), NAME, TaggedValue::from("b"), tx(2)),
        ];
        let entity = NAME.entity_id();
        let delta = Delta {
            retracts: vec![Datom::retract(entity, DB_CARDINALITY, TaggedValue::UInt8(2), tx(1))],
            asserts: vec![Datom::assert(entity, DB_CARDINALITY, TaggedValue::UInt8(1), tx(5))],
        };
        assert!(apply_schema_delta(&catalog(), &snapshot_with(&stored), &delta).is_err());
        assert!(apply_schema_delta(&catalog(), &snapshot_with(&stored[..1]), &delta).is_ok());
    }
}
