//! Identifier allocation and temporary id remapping.

use crate::error::{CoreError, CoreResult};
use crate::snapshot::last_tx;
use factdb_codec::{
    AttributeId, EntityId, IndexType, KeyPrefix, PartitionId, PrefixView, TxId, ValueTag,
    COUNTER_MASK,
};
use factdb_storage::{KvSnapshot, ReadOptions};
use std::collections::BTreeMap;

/// Per-partition id counters.
///
/// A slot holds the highest counter known to be in use. Slots start empty
/// and are filled from the indexes on first use, so a freshly opened or
/// imported store needs no persisted counters.
#[derive(Debug, Clone)]
pub(crate) struct NextIdCache {
    last: [Option<u64>; 256],
}

impl Default for NextIdCache {
    fn default() -> Self {
        Self { last: [None; 256] }
    }
}

impl NextIdCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forgets every counter; they are re-read on next use.
    pub(crate) fn reset(&mut self) {
        self.last = [None; 256];
    }

    fn slot(&mut self, partition: PartitionId, kv: &KvSnapshot) -> &mut u64 {
        let index = usize::from(partition.as_u8());
        self.last[index].get_or_insert_with(|| highest_counter(kv, partition))
    }

    /// Allocates the next id in `partition`.
    pub(crate) fn next_id(&mut self, partition: PartitionId, kv: &KvSnapshot) -> CoreResult<EntityId> {
        let slot = self.slot(partition, kv);
        let next = slot
            .checked_add(1)
            .filter(|n| *n <= COUNTER_MASK)
            .ok_or(CoreError::IdSpaceExhausted { partition })?;
        *slot = next;
        Ok(EntityId::in_partition(partition, next))
    }

    /// Allocates the next transaction id.
    pub(crate) fn next_tx(&mut self, kv: &KvSnapshot) -> CoreResult<TxId> {
        let index = usize::from(PartitionId::TRANSACTIONS.as_u8());
        if self.last[index].is_none() {
            let logged = last_tx(kv).map_or(0, TxId::counter);
            let seen = highest_counter(kv, PartitionId::TRANSACTIONS);
            self.last[index] = Some(logged.max(seen));
        }
        let entity = self.next_id(PartitionId::TRANSACTIONS, kv)?;
        Ok(TxId::new(entity.as_u64()))
    }

    /// Raises the counter of `entity`'s partition to cover it.
    ///
    /// Only partitions already loaded are touched; others read the
    /// committed id from the indexes when first used.
    pub(crate) fn observe(&mut self, entity: EntityId) {
        if entity.is_temp() {
            return;
        }
        if let Some(last) = &mut self.last[usize::from(entity.partition().as_u8())] {
            *last = (*last).max(entity.counter());
        }
    }
}

fn partition_floor(partition: PartitionId) -> Vec<u8> {
    let prefix = KeyPrefix {
        entity: EntityId::new(partition.min_id()),
        attribute: AttributeId::new(0),
        tx: TxId::new(0),
        is_retract: false,
        value_tag: ValueTag::Null.as_byte(),
    };
    let mut out = Vec::with_capacity(21);
    prefix.write_to(&mut out);
    out
}

/// Highest entity counter in `partition` across EAVT current and history.
fn highest_counter(kv: &KvSnapshot, partition: PartitionId) -> u64 {
    let next = partition.as_u8().checked_add(1).map(PartitionId::new);
    [IndexType::EAVTCurrent, IndexType::EAVTHistory]
        .into_iter()
        .filter_map(|index| {
            let byte = index.as_byte();
            let mut cursor = kv.cursor(
                ReadOptions::new()
                    .lower_bound(vec![byte])
                    .upper_bound(vec![byte + 1]),
            );
            match next {
                Some(next) => {
                    let mut target = vec![byte];
                    target.extend_from_slice(&partition_floor(next));
                    cursor.seek_for_prev(&target);
                }
                None => cursor.seek_to_last(),
            }
            let view = PrefixView::parse(cursor.key()?.get(1..)?)?;
            let entity = EntityId::new(view.entity);
            (entity.partition() == partition).then(|| entity.counter())
        })
        .max()
        .unwrap_or(0)
}

/// Maps temporary ids to allocated ids for one transaction.
#[derive(Debug)]
pub(crate) struct TempIdRemapper {
    tx: TxId,
    map: BTreeMap<EntityId, EntityId>,
}

impl TempIdRemapper {
    pub(crate) fn new(tx: TxId) -> Self {
        Self {
            tx,
            map: BTreeMap::new(),
        }
    }

    /// Resolves `entity`. Non-temporary ids pass through unchanged.
    pub(crate) fn resolve(
        &mut self,
        entity: EntityId,
        ids: &mut NextIdCache,
        kv: &KvSnapshot,
    ) -> CoreResult<EntityId> {
        if !entity.is_temp() {
            return Ok(entity);
        }
        if entity == EntityId::THIS_TX {
            return Ok(self.tx.as_entity());
        }
        if let Some(id) = self.map.get(&entity) {
            return Ok(*id);
        }
        let target = entity.temp_target();
        if matches!(
            target,
            PartitionId::ATTRIBUTE | PartitionId::TRANSACTIONS | PartitionId::TEMP
        ) {
            return Err(CoreError::invalid_operation(format!(
                "temporary id {entity} targets reserved {target}"
            )));
        }
        let id = ids.next_id(target, kv)?;
        self.map.insert(entity, id);
        Ok(id)
    }

    /// Temporary ids resolved so far, excluding the transaction sentinel.
    pub(crate) fn into_remaps(self) -> BTreeMap<EntityId, EntityId> {
        self.map
    }
}
