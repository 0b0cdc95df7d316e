//! The attribute catalog.

use super::{
    builtins, AttributeRecord, Cardinality, DB_CARDINALITY, DB_IDENT, DB_INDEXED, DB_NO_HISTORY,
    DB_UNIQUE, DB_VALUE_TYPE,
};
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{scan, SliceDescriptor};
use factdb_codec::{
    AttributeId, Datom, EntityId, IndexType, PartitionId, TaggedValue, ValueTag,
};
use factdb_storage::KvSnapshot;
use std::collections::HashMap;

const FLAG_MANY: u8 = 1 << 0;
const FLAG_INDEXED: u8 = 1 << 1;
const FLAG_REFERENCE: u8 = 1 << 2;
const FLAG_UNIQUE: u8 = 1 << 3;
const FLAG_NO_HISTORY: u8 = 1 << 4;

fn flags_of(record: &AttributeRecord) -> u8 {
    let mut flags = 0;
    if record.cardinality == Cardinality::Many {
        flags |= FLAG_MANY;
    }
    if record.in_avet() {
        flags |= FLAG_INDEXED;
    }
    if record.is_reference() {
        flags |= FLAG_REFERENCE;
    }
    if record.unique {
        flags |= FLAG_UNIQUE;
    }
    if record.no_history {
        flags |= FLAG_NO_HISTORY;
    }
    flags
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    ident: String,
    record: AttributeRecord,
}

/// Maps attribute idents to dense ids and caches their metadata.
///
/// Flag reads index a byte array by attribute id, since they run once per
/// datom on the write path. The catalog is never mutated while shared: the
/// writer edits a private copy and publishes it with the next snapshot.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    entries: Vec<Option<CatalogEntry>>,
    flags: Vec<u8>,
    by_ident: HashMap<String, AttributeId>,
}

impl AttributeCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding only the built-in `db/*` attributes.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for (id, ident, record) in builtins() {
            catalog.insert(id, ident, record);
        }
        catalog
    }

    /// Registers `ident`, returning its id.
    ///
    /// Idempotent: a known ident returns its existing id and `record` is
    /// ignored. New idents get the id after the highest one in use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdSpaceExhausted`] once every u16 id is taken.
    pub fn register(&mut self, ident: &str, record: AttributeRecord) -> CoreResult<AttributeId> {
        if let Some(id) = self.by_ident.get(ident) {
            return Ok(*id);
        }
        let id = self.next_id()?;
        self.insert(id, ident, record);
        Ok(id)
    }

    /// The id the next new attribute would get.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdSpaceExhausted`] once every u16 id is taken.
    pub fn next_id(&self) -> CoreResult<AttributeId> {
        let next = self.entries.len().max(1);
        u16::try_from(next)
            .map(AttributeId::new)
            .map_err(|_| CoreError::IdSpaceExhausted {
                partition: PartitionId::ATTRIBUTE,
            })
    }

    /// Sets the definition of `id`, replacing any previous one.
    pub(crate) fn insert(&mut self, id: AttributeId, ident: &str, record: AttributeRecord) {
        let slot = usize::from(id.as_u16());
        if self.entries.len() <= slot {
            self.entries.resize(slot + 1, None);
            self.flags.resize(slot + 1, 0);
        }
        if let Some(old) = &self.entries[slot] {
            if old.ident != ident {
                self.by_ident.remove(&old.ident);
            }
        }
        let record = record.normalized();
        self.flags[slot] = flags_of(&record);
        self.entries[slot] = Some(CatalogEntry {
            ident: ident.to_string(),
            record,
        });
        self.by_ident.insert(ident.to_string(), id);
    }

    /// Metadata of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttribute`] if `id` was never registered.
    pub fn lookup(&self, id: AttributeId) -> CoreResult<&AttributeRecord> {
        self.entry(id)
            .map(|e| &e.record)
            .ok_or(CoreError::UnknownAttribute { id })
    }

    /// Symbolic ident of `id`.
    #[must_use]
    pub fn ident(&self, id: AttributeId) -> Option<&str> {
        self.entry(id).map(|e| e.ident.as_str())
    }

    /// Id of `ident`, if registered.
    #[must_use]
    pub fn get(&self, ident: &str) -> Option<AttributeId> {
        self.by_ident.get(ident).copied()
    }

    /// Id of `ident`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttributeIdent`] if it was never
    /// registered.
    pub fn resolve(&self, ident: &str) -> CoreResult<AttributeId> {
        self.get(ident).ok_or_else(|| CoreError::UnknownAttributeIdent {
            ident: ident.to_string(),
        })
    }

    fn entry(&self, id: AttributeId) -> Option<&CatalogEntry> {
        self.entries.get(usize::from(id.as_u16()))?.as_ref()
    }

    #[inline]
    fn flag(&self, id: AttributeId, bit: u8) -> bool {
        self.flags
            .get(usize::from(id.as_u16()))
            .is_some_and(|f| f & bit != 0)
    }

    /// Whether `id` holds many values per entity.
    #[must_use]
    pub fn is_cardinality_many(&self, id: AttributeId) -> bool {
        self.flag(id, FLAG_MANY)
    }

    /// Whether `id` is kept in AVET.
    #[must_use]
    pub fn is_indexed(&self, id: AttributeId) -> bool {
        self.flag(id, FLAG_INDEXED)
    }

    /// Whether `id` holds entity references.
    #[must_use]
    pub fn is_reference(&self, id: AttributeId) -> bool {
        self.flag(id, FLAG_REFERENCE)
    }

    /// Whether `id` is unique.
    #[must_use]
    pub fn is_unique(&self, id: AttributeId) -> bool {
        self.flag(id, FLAG_UNIQUE)
    }

    /// Whether `id` skips history.
    #[must_use]
    pub fn is_no_history(&self, id: AttributeId) -> bool {
        self.flag(id, FLAG_NO_HISTORY)
    }

    /// Registered attributes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, &str, &AttributeRecord)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            let e = e.as_ref()?;
            let id = AttributeId::new(u16::try_from(i).ok()?);
            Some((id, e.ident.as_str(), &e.record))
        })
    }

    /// Number of registered attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_ident.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_ident.is_empty()
    }

    /// Rebuilds the catalog from the definition datoms in `kv`.
    ///
    /// # Errors
    ///
    /// Fails on undecodable keys or an incomplete definition.
    pub(crate) fn load(kv: &KvSnapshot) -> CoreResult<Self> {
        let mut catalog = Self::new();
        let mut current: Vec<Datom> = Vec::new();
        let flush = |group: &mut Vec<Datom>, catalog: &mut Self| -> CoreResult<()> {
            if let Some(first) = group.first() {
                let entity = first.entity;
                let (id, ident, record) = definition_from_datoms(entity, group)?;
                catalog.insert(id, &ident, record);
            }
            group.clear();
            Ok(())
        };

        let slice = SliceDescriptor::partition(PartitionId::ATTRIBUTE);
        for entry in scan(kv, IndexType::EAVTCurrent, &slice)? {
            let datom = entry.datom;
            if current.first().is_some_and(|d| d.entity != datom.entity) {
                flush(&mut current, &mut catalog)?;
            }
            current.push(datom);
        }
        flush(&mut current, &mut catalog)?;
        Ok(catalog)
    }
}

fn flag_value(datom: &Datom) -> CoreResult<bool> {
    match datom.value {
        TaggedValue::UInt8(0) => Ok(false),
        TaggedValue::UInt8(1) => Ok(true),
        ref other => Err(CoreError::invalid_operation(format!(
            "flag {} of {} must be 0 or 1, got {other}",
            datom.attribute, datom.entity
        ))),
    }
}

/// Reads one attribute definition from its datoms.
pub(crate) fn definition_from_datoms(
    entity: EntityId,
    datoms: &[Datom],
) -> CoreResult<(AttributeId, String, AttributeRecord)> {
    let id = AttributeId::from_entity(entity)
        .filter(|id| id.as_u16() != 0)
        .ok_or_else(|| CoreError::invalid_operation(format!("{entity} is not an attribute entity")))?;

    let mut ident = None;
    let mut value_tag = None;
    let mut record = AttributeRecord::new(ValueTag::Null);
    for d in datoms.iter().filter(|d| !d.is_retract) {
        match d.attribute {
            a if a == DB_IDENT => ident = d.value.as_str().map(str::to_string),
            a if a == DB_VALUE_TYPE => {
                value_tag = match d.value {
                    TaggedValue::UInt8(b) => ValueTag::from_byte(b),
                    _ => None,
                };
            }
            a if a == DB_CARDINALITY => {
                record.cardinality = match d.value {
                    TaggedValue::UInt8(b) => Cardinality::from_u8(b),
                    _ => None,
                }
                .ok_or_else(|| {
                    CoreError::invalid_operation(format!("invalid cardinality {} on {id}", d.value))
                })?;
            }
            a if a == DB_INDEXED => record.indexed = flag_value(d)?,
            a if a == DB_UNIQUE => record.unique = flag_value(d)?,
            a if a == DB_NO_HISTORY => record.no_history = flag_value(d)?,
            _ => {}
        }
    }

    let ident = ident.ok_or_else(|| CoreError::invalid_operation(format!("{id} has no db/ident")))?;
    record.value_tag = value_tag
        .ok_or_else(|| CoreError::invalid_operation(format!("{id} has no valid db/valueType")))?;
    Ok((id, ident, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::DB_TX_TIMESTAMP;
    use factdb_codec::TxId;

    #[test]
    fn builtins_resolve() {
        let catalog = AttributeCatalog::with_builtins();
        assert_eq!(catalog.resolve("db/ident").unwrap(), DB_IDENT);
        assert_eq!(catalog.resolve("db/txTimestamp").unwrap(), DB_TX_TIMESTAMP);
        assert!(catalog.is_unique(DB_IDENT));
        assert!(catalog.is_indexed(DB_IDENT));
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn register_is_idempotent_and_dense() {
        let mut catalog = AttributeCatalog::with_builtins();
        let name = catalog
            .register("person/name", AttributeRecord::new(ValueTag::Utf8))
            .unwrap();
        let again = catalog
            .register("person/name", AttributeRecord::new(ValueTag::Int64).many())
            .unwrap();
        let email = catalog
            .register("person/email", AttributeRecord::new(ValueTag::Utf8).unique())
            .unwrap();
        assert_eq!(name, AttributeId::new(8));
        assert_eq!(again, name);
        assert_eq!(email, AttributeId::new(9));
        assert_eq!(catalog.lookup(name).unwrap().value_tag, ValueTag::Utf8);
    }

    #[test]
    fn empty_catalog_starts_at_one() {
        let mut catalog = AttributeCatalog::new();
        let id = catalog.register("x", AttributeRecord::new(ValueTag::Null)).unwrap();
        assert_eq!(id, AttributeId::new(1));
    }

    #[test]
    fn flags_follow_records() {
        let mut catalog = AttributeCatalog::new();
        let friends = catalog
            .register("friends", AttributeRecord::new(ValueTag::Reference).many().no_history())
            .unwrap();
        assert!(catalog.is_cardinality_many(friends));
        assert!(catalog.is_reference(friends));
        assert!(catalog.is_no_history(friends));
        assert!(!catalog.is_indexed(friends));
        assert!(!catalog.is_unique(friends));
    }

    #[test]
    fn unknown_ids_fail_lookup_and_read_as_unset() {
        let catalog = AttributeCatalog::with_builtins();
        let missing = AttributeId::new(500);
        assert!(matches!(
            catalog.lookup(missing),
            Err(CoreError::UnknownAttribute { id }) if id == missing
        ));
        assert!(!catalog.is_indexed(missing));
        assert!(catalog.resolve("nope").is_err());
    }

    #[test]
    fn rename_drops_old_ident() {
        let mut catalog = AttributeCatalog::new();
        let id = catalog.register("old", AttributeRecord::new(ValueTag::Utf8)).unwrap();
        catalog.insert(id, "new", AttributeRecord::new(ValueTag::Utf8));
        assert_eq!(catalog.get("old"), None);
        assert_eq!(catalog.get("new"), Some(id));
    }

    #[test]
    fn definition_reads_datoms() {
        let id = AttributeId::new(12);
        let e = id.entity_id();
        let tx = TxId::from_counter(2);
        let datoms = vec![
            Datom::assert(e, DB_IDENT, TaggedValue::from("tag/names"), tx),
            Datom::assert(e, DB_VALUE_TYPE, TaggedValue::UInt8(ValueTag::Utf8.as_byte()), tx),
            Datom::assert(e, DB_CARDINALITY, TaggedValue::UInt8(2), tx),
            Datom::assert(e, DB_INDEXED, TaggedValue::UInt8(1), tx),
        ];
        let (got, ident, record) = definition_from_datoms(e, &datoms).unwrap();
        assert_eq!(got, id);
        assert_eq!(ident, "tag/names");
        assert_eq!(record, AttributeRecord::new(ValueTag::Utf8).many().indexed());
    }

    #[test]
    fn definition_without_type_is_rejected() {
        let e = AttributeId::new(12).entity_id();
        let datoms = vec![Datom::assert(e, DB_IDENT, TaggedValue::from("x"), TxId::from_counter(2))];
        assert!(definition_from_datoms(e, &datoms).is_err());
    }
}
