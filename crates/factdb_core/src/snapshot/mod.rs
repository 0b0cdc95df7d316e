//! Point-in-time reads.
//!
//! A [`Snapshot`] pairs a backend snapshot with the attribute catalog that
//! was in force when it was taken. It never changes: later commits publish
//! new snapshots instead.
//!
//! Three views are available over the same data:
//!
//! | View        | Reads                                          |
//! |-------------|------------------------------------------------|
//! | `Current`   | the `*Current` indexes directly                |
//! | `AsOf(tx)`  | current + history, `tx <= as_of`, cancelled    |
//! | `History`   | current + history, every assertion and marker  |

mod merge;
mod scan;
mod slice;

use scan::count;
pub(crate) use scan::{last_tx, scan};
pub use slice::SliceDescriptor;

use crate::attribute::AttributeCatalog;
use crate::error::CoreResult;
use factdb_codec::{
    comparator_for, AttributeId, Datom, EntityId, IndexFamily, IndexType, TaggedValue, TxId,
};
use factdb_storage::KvSnapshot;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Which state a [`Snapshot`] presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Latest committed state.
    Current,
    /// State as it stood right after `tx` committed.
    AsOf(TxId),
    /// Every assertion and retraction ever made.
    History,
}

/// An immutable view of the store.
///
/// Cloning is cheap; the underlying backend snapshot is released when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Snapshot {
    kv: KvSnapshot,
    catalog: Arc<AttributeCatalog>,
    basis: TxId,
    view: View,
}

impl Snapshot {
    pub(crate) fn new(kv: KvSnapshot, catalog: Arc<AttributeCatalog>, basis: TxId) -> Self {
        Self {
            kv,
            catalog,
            basis,
            view: View::Current,
        }
    }

    /// The same data seen through another view.
    #[must_use]
    pub fn with_view(&self, view: View) -> Self {
        Self {
            view,
            ..self.clone()
        }
    }

    /// Shorthand for `with_view(View::AsOf(tx))`.
    #[must_use]
    pub fn as_of(&self, tx: TxId) -> Self {
        self.with_view(View::AsOf(tx))
    }

    /// Shorthand for `with_view(View::History)`.
    #[must_use]
    pub fn history_view(&self) -> Self {
        self.with_view(View::History)
    }

    /// Last transaction visible in this snapshot.
    #[must_use]
    pub fn basis(&self) -> TxId {
        self.basis
    }

    /// The active view.
    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    /// The attribute catalog as of this snapshot.
    #[must_use]
    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub(crate) fn kv(&self) -> &KvSnapshot {
        &self.kv
    }

    /// Number of raw keys stored in `index`, regardless of view.
    #[must_use]
    pub fn index_len(&self, index: IndexType) -> usize {
        count(&self.kv, index)
    }

    /// Datoms of `slice`, in index order, under this snapshot's view.
    ///
    /// # Errors
    ///
    /// Fails on undecodable keys, and with [`CoreError::IndexInvariant`](crate::CoreError::IndexInvariant)
    /// if a retraction in history has no matching assertion.
    pub fn datoms(&self, slice: &SliceDescriptor) -> CoreResult<Vec<Datom>> {
        let family = slice.family();
        let current_index = family.current();
        let current = scan(&self.kv, current_index, slice)?;
        if self.view == View::Current {
            return Ok(current.into_iter().map(|e| e.datom).collect());
        }

        let Some(history_index) = family.history() else {
            // The log has no history variant; it is already complete.
            let datoms = current.into_iter().map(|e| e.datom);
            return Ok(match self.view {
                View::AsOf(tx) => datoms.filter(|d| d.tx <= tx).collect(),
                _ => datoms.collect(),
            });
        };
        let history = scan(&self.kv, history_index, slice)?;
        let merged = merge::merge(comparator_for(current_index), current, history);
        match self.view {
            View::AsOf(tx) => merge::cancel_retractions(merge::filter_as_of(merged, tx)),
            _ => Ok(merged),
        }
    }

    /// Every attribute value of `entity`.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn entity(&self, entity: EntityId) -> CoreResult<BTreeMap<AttributeId, Vec<TaggedValue>>> {
        let mut out: BTreeMap<AttributeId, Vec<TaggedValue>> = BTreeMap::new();
        for d in self.visible(&SliceDescriptor::entity(entity))? {
            out.entry(d.attribute).or_default().push(d.value);
        }
        Ok(out)
    }

    /// The value of a single-valued attribute.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn value(&self, entity: EntityId, attribute: AttributeId) -> CoreResult<Option<TaggedValue>> {
        Ok(self.values(entity, attribute)?.into_iter().next())
    }

    /// Every value of `attribute` on `entity`, in value order.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn values(&self, entity: EntityId, attribute: AttributeId) -> CoreResult<Vec<TaggedValue>> {
        Ok(self
            .visible(&SliceDescriptor::entity_attribute(entity, attribute))?
            .into_iter()
            .map(|d| d.value)
            .collect())
    }

    /// Entities whose `attribute` holds `value`.
    ///
    /// Uses AVET when the attribute is indexed and falls back to scanning
    /// AEVT otherwise.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::UnknownAttribute`](crate::CoreError::UnknownAttribute) for unregistered
    /// attributes, or as [`Snapshot::datoms`].
    pub fn find(&self, attribute: AttributeId, value: &TaggedValue) -> CoreResult<Vec<EntityId>> {
        let record = self.catalog.lookup(attribute)?;
        let datoms = if record.in_avet() {
            self.visible(&SliceDescriptor::attribute_value(attribute, value))?
        } else {
            self.visible(&SliceDescriptor::attribute(attribute))?
                .into_iter()
                .filter(|d| &d.value == value)
                .collect()
        };
        let mut entities: Vec<EntityId> = datoms.into_iter().map(|d| d.entity).collect();
        entities.dedup();
        Ok(entities)
    }

    /// Datoms whose value references `target`.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn referencing(&self, target: EntityId) -> CoreResult<Vec<Datom>> {
        self.visible(&SliceDescriptor::references(target))
    }

    /// Everything `tx` wrote, retraction markers included.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn tx_log(&self, tx: TxId) -> CoreResult<Vec<Datom>> {
        scan(&self.kv, IndexType::TxLog, &SliceDescriptor::tx(tx))
            .map(|entries| entries.into_iter().map(|e| e.datom).collect())
    }

    /// Every assertion and retraction of `attribute` on `entity`, oldest
    /// first. Within one transaction retractions come before assertions.
    ///
    /// An `AsOf` view stops at its transaction; other views return
    /// everything.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::datoms`].
    pub fn history(&self, entity: EntityId, attribute: AttributeId) -> CoreResult<Vec<Datom>> {
        let mut datoms = self
            .with_view(View::History)
            .datoms(&SliceDescriptor::entity_attribute(entity, attribute))?;
        if let View::AsOf(tx) = self.view {
            datoms.retain(|d| d.tx <= tx);
        }
        datoms.sort_by(|a, b| a.tx.cmp(&b.tx).then_with(|| b.is_retract.cmp(&a.is_retract)));
        Ok(datoms)
    }

    /// Datoms of a slice as they stand in this view, without retraction
    /// markers.
    fn visible(&self, slice: &SliceDescriptor) -> CoreResult<Vec<Datom>> {
        let mut datoms = self.datoms(slice)?;
        if self.view == View::History {
            datoms.retain(|d| !d.is_retract);
        }
        Ok(datoms)
    }

    /// Stored values of `(entity, attribute)`, ignoring the view.
    pub(crate) fn current_values(&self, entity: EntityId, attribute: AttributeId) -> CoreResult<Vec<Datom>> {
        scan(
            &self.kv,
            IndexType::EAVTCurrent,
            &SliceDescriptor::entity_attribute(entity, attribute),
        )
        .map(|entries| entries.into_iter().map(|e| e.datom).collect())
    }

    /// Current owners of `value` under `attribute`, ignoring the view.
    pub(crate) fn current_owners(&self, attribute: AttributeId, value: &TaggedValue) -> CoreResult<Vec<Datom>> {
        scan(
            &self.kv,
            IndexType::AVETCurrent,
            &SliceDescriptor::attribute_value(attribute, value),
        )
        .map(|entries| entries.into_iter().map(|e| e.datom).collect())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("basis", &self.basis)
            .field("view", &self.view)
            .field("sequence", &self.kv.sequence())
            .field("attributes", &self.catalog.len())
            .finish()
    }
}

/// Family names accepted by [`IndexFamily::from_name`], for error messages.
#[must_use]
pub fn family_names() -> Vec<&'static str> {
    IndexFamily::ALL.iter().map(|f| f.name()).collect()
}

