//! Reduces a transaction's operations to the minimal change against
//! stored state.

use super::{AttrRef, Op};
use crate::attribute::{AttributeCatalog, AttributeRecord, Cardinality};
use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use factdb_codec::{AttributeId, Datom, EntityId, TaggedValue, TxId};
use std::collections::{BTreeMap, BTreeSet};

/// The minimal change a transaction makes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Delta {
    /// Superseded datoms exactly as stored, carrying their original tx.
    pub retracts: Vec<Datom>,
    /// New datoms at the committing tx.
    pub asserts: Vec<Datom>,
}

#[cfg(test)]
impl Delta {
    pub(crate) fn is_empty(&self) -> bool {
        self.retracts.is_empty() && self.asserts.is_empty()
    }
}

/// Final intent for a single-valued attribute on one entity.
#[derive(Debug)]
enum OneIntent {
    /// The value after this transaction.
    Set(TaggedValue),
    /// No value after this transaction.
    Clear,
    /// No assertion; these values go if they are the stored one.
    Drop(Vec<TaggedValue>),
}

impl OneIntent {
    fn retract(&mut self, value: TaggedValue) {
        match self {
            Self::Set(current) if *current == value => *self = Self::Clear,
            Self::Set(_) | Self::Clear => {}
            Self::Drop(values) => values.push(value),
        }
    }
}

fn resolve(catalog: &AttributeCatalog, attribute: &AttrRef) -> CoreResult<(AttributeId, AttributeRecord)> {
    let id = match attribute {
        AttrRef::Id(id) => *id,
        AttrRef::Ident(ident) => catalog.resolve(ident)?,
    };
    Ok((id, *catalog.lookup(id)?))
}

/// Normalizes `ops` into a [`Delta`] at `tx`.
///
/// Single-valued attributes keep the last assertion per `(E, A)`; a
/// retraction clears only the value that would otherwise remain.
/// Multi-valued attributes keep the last operation per `(E, A, V)`. Stored
/// state is read for permanent entities only.
///
/// # Errors
///
/// Fails on unknown attributes, values of the wrong type, and uniqueness
/// violations. Nothing is written either way.
pub(crate) fn normalize(
    ops: Vec<Op>,
    catalog: &AttributeCatalog,
    snapshot: &Snapshot,
    tx: TxId,
) -> CoreResult<Delta> {
    let mut one: BTreeMap<(EntityId, AttributeId), OneIntent> = BTreeMap::new();
    let mut many: BTreeMap<(EntityId, AttributeId), BTreeMap<TaggedValue, bool>> = BTreeMap::new();

    for op in ops {
        let (attribute, record) = resolve(catalog, &op.attribute)?;
        if !op.retract && op.value.tag() != record.value_tag {
            return Err(CoreError::ValueTypeMismatch {
                attribute,
                expected: record.value_tag.name(),
                actual: op.value.tag().name(),
            });
        }
        let key = (op.entity, attribute);
        match record.cardinality {
            Cardinality::One if op.retract => one
                .entry(key)
                .or_insert_with(|| OneIntent::Drop(Vec::new()))
                .retract(op.value),
            Cardinality::One => {
                one.insert(key, OneIntent::Set(op.value));
            }
            Cardinality::Many => {
                many.entry(key).or_default().insert(op.value, !op.retract);
            }
        }
    }

    let mut delta = Delta::default();
    let mut retracted: BTreeSet<(EntityId, AttributeId, TaggedValue)> = BTreeSet::new();
    let mut retract = |delta: &mut Delta, datom: Datom| {
        if retracted.insert((datom.entity, datom.attribute, datom.value.clone())) {
            delta.retracts.push(datom);
        }
    };
    let stored = |entity: EntityId, attribute: AttributeId| -> CoreResult<Vec<Datom>> {
        if entity.is_temp() {
            Ok(Vec::new())
        } else {
            snapshot.current_values(entity, attribute)
        }
    };

    for ((entity, attribute), intent) in one {
        let existing = stored(entity, attribute)?;
        match intent {
            OneIntent::Set(value) => {
                let mut kept = false;
                for old in existing {
                    if old.value == value {
                        kept = true;
                    } else {
                        retract(&mut delta, old);
                    }
                }
                if !kept {
                    delta.asserts.push(Datom::assert(entity, attribute, value, tx));
                }
            }
            OneIntent::Clear => existing.into_iter().for_each(|old| retract(&mut delta, old)),
            OneIntent::Drop(values) => existing
                .into_iter()
                .filter(|old| values.contains(&old.value))
                .for_each(|old| retract(&mut delta, old)),
        }
    }

    for ((entity, attribute), ops) in many {
        let existing = stored(entity, attribute)?;
        for (value, assert) in ops {
            let old = existing.iter().find(|d| d.value == value);
            match (assert, old) {
                (true, None) => delta.asserts.push(Datom::assert(entity, attribute, value, tx)),
                (false, Some(old)) => retract(&mut delta, old.clone()),
                _ => {}
            }
        }
    }

    check_unique(&delta, catalog, snapshot)?;
    Ok(delta)
}

fn check_unique(delta: &Delta, catalog: &AttributeCatalog, snapshot: &Snapshot) -> CoreResult<()> {
    let violation = |d: &Datom, existing: EntityId| CoreError::UniqueConstraintViolation {
        attribute: d.attribute,
        value: d.value.to_string(),
        existing,
        conflicting: d.entity,
    };

    let mut claimed: BTreeMap<(AttributeId, &TaggedValue), EntityId> = BTreeMap::new();
    for d in delta.asserts.iter().filter(|d| catalog.is_unique(d.attribute)) {
        if let Some(other) = claimed.insert((d.attribute, &d.value), d.entity) {
            if other != d.entity {
                return Err(violation(d, other));
            }
        }
        for owner in snapshot.current_owners(d.attribute, &d.value)? {
            let released = delta.retracts.iter().any(|r| r.same_fact(&owner));
            if owner.entity != d.entity && !released {
                return Err(violation(d, owner.entity));
            }
        }
    }
    Ok(())
}
