//! The single writer.
//!
//! Every change to a store goes through one dedicated thread that drains a
//! request queue in order. Normalization reads the latest committed state
//! without locks, because nothing else can commit in between.
//!
//! ```text
//! Store::submit ──► mpsc ──► factdb-writer ──► KvBackend::commit
//!      ▲                         │
//!      └──── oneshot reply ◄─────┴──► publish Snapshot
//! ```

use crate::allocator::{NextIdCache, TempIdRemapper};
use crate::attribute::{
    apply_schema_delta, definition_ops, AttributeCatalog, AttributeRecord, DB_TX_TIMESTAMP,
};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::export::{ImportData, ImportSummary};
use crate::indexer::build_batch;
use crate::snapshot::{last_tx, Snapshot};
use crate::store::StoreResult;
use crate::transaction::{normalize, Delta, Op, Transaction};
use factdb_codec::{AttributeId, Datom, EntityId, TaggedValue, TxId};
use factdb_storage::{KvBackend, KvSnapshot};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, watch};

pub(crate) type Reply<T> = oneshot::Sender<CoreResult<T>>;

/// Work for the writer thread.
pub(crate) enum Request {
    Submit {
        tx: Transaction,
        reply: Reply<StoreResult>,
    },
    RegisterAttribute {
        ident: String,
        record: AttributeRecord,
        reply: Reply<AttributeId>,
    },
    Import {
        data: ImportData,
        reply: Reply<ImportSummary>,
    },
    Shutdown,
}

/// State shared between the writer and readers.
#[derive(Debug)]
pub(crate) struct Shared {
    current: RwLock<Snapshot>,
    revisions: watch::Sender<Snapshot>,
}

impl Shared {
    fn new(snapshot: Snapshot) -> Self {
        let (revisions, _) = watch::channel(snapshot.clone());
        Self {
            current: RwLock::new(snapshot),
            revisions,
        }
    }

    pub(crate) fn current(&self) -> Snapshot {
        self.current.read().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.revisions.subscribe()
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.current.write() = snapshot.clone();
        // Stored even without receivers, so new subscribers start current.
        self.revisions.send_replace(snapshot);
    }
}

pub(crate) struct Writer {
    backend: Arc<dyn KvBackend>,
    shared: Arc<Shared>,
    catalog: Arc<AttributeCatalog>,
    ids: NextIdCache,
    config: StoreConfig,
    poisoned: Option<String>,
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
}

fn assert_op(entity: EntityId, attribute: AttributeId, value: TaggedValue) -> Op {
    Op {
        entity,
        attribute: attribute.into(),
        value,
        retract: false,
    }
}

impl Writer {
    /// Loads the catalog from `backend`, bootstrapping an empty store.
    pub(crate) fn open(backend: Arc<dyn KvBackend>, config: StoreConfig) -> CoreResult<Self> {
        let kv = backend.snapshot();
        let (catalog, basis) = match last_tx(&kv) {
            Some(basis) => (AttributeCatalog::load(&kv)?, basis),
            None => (AttributeCatalog::with_builtins(), TxId::new(0)),
        };
        let catalog = Arc::new(catalog);
        let shared = Arc::new(Shared::new(Snapshot::new(kv, Arc::clone(&catalog), basis)));
        let mut writer = Self {
            backend,
            shared,
            catalog,
            ids: NextIdCache::new(),
            config,
            poisoned: None,
        };
        if basis == TxId::new(0) {
            writer.bootstrap()?;
        } else {
            tracing::info!(basis = %basis, attributes = writer.catalog.len(), "store opened");
        }
        Ok(writer)
    }

    pub(crate) fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Commits the built-in attribute definitions as the first transaction.
    fn bootstrap(&mut self) -> CoreResult<()> {
        let ops = self
            .catalog
            .iter()
            .flat_map(|(id, ident, record)| definition_ops(id, ident, *record))
            .map(|(e, a, v)| assert_op(e, a, v))
            .collect();
        let result = self.commit(self.shared.current(), ops, Instant::now())?;
        tracing::info!(tx = %result.assigned_tx, datoms = result.asserted, "bootstrapped empty store");
        Ok(())
    }

    /// Starts the writer thread.
    pub(crate) fn spawn(self) -> CoreResult<(mpsc::UnboundedSender<Request>, JoinHandle<()>)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = std::thread::Builder::new()
            .name("factdb-writer".to_string())
            .spawn(move || self.run(receiver))?;
        Ok((sender, handle))
    }

    fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = receiver.blocking_recv() {
            match request {
                Request::Submit { tx, reply } => {
                    let _ = reply.send(self.submit(tx));
                }
                Request::RegisterAttribute { ident, record, reply } => {
                    let _ = reply.send(self.register_attribute(&ident, record));
                }
                Request::Import { data, reply } => {
                    let _ = reply.send(self.import(data));
                }
                Request::Shutdown => break,
            }
        }
        tracing::debug!("writer stopped");
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        match &self.poisoned {
            Some(reason) => Err(CoreError::WritesDisabled {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn submit(&mut self, tx: Transaction) -> CoreResult<StoreResult> {
        self.ensure_writable()?;
        let started = Instant::now();
        let snapshot = self.shared.current();
        let ops = tx.expand(&snapshot)?;
        self.commit(snapshot, ops, started)
    }

    fn register_attribute(&mut self, ident: &str, record: AttributeRecord) -> CoreResult<AttributeId> {
        if let Some(id) = self.catalog.get(ident) {
            return Ok(id);
        }
        self.ensure_writable()?;
        let id = self.catalog.next_id()?;
        let ops = definition_ops(id, ident, record)
            .into_iter()
            .map(|(e, a, v)| assert_op(e, a, v))
            .collect();
        self.commit(self.shared.current(), ops, Instant::now())?;
        Ok(id)
    }

    /// Runs one transaction. Id counters roll back if it fails.
    fn commit(&mut self, snapshot: Snapshot, ops: Vec<Op>, started: Instant) -> CoreResult<StoreResult> {
        let saved = self.ids.clone();
        let result = self.try_commit(&snapshot, ops, started);
        if result.is_err() {
            self.ids = saved;
        }
        result
    }

    fn try_commit(&mut self, snapshot: &Snapshot, mut ops: Vec<Op>, started: Instant) -> CoreResult<StoreResult> {
        let kv = snapshot.kv();
        let tx = self.ids.next_tx(kv)?;
        ops.push(assert_op(
            EntityId::THIS_TX,
            DB_TX_TIMESTAMP,
            TaggedValue::Int64(now_micros()),
        ));

        let delta = normalize(ops, &self.catalog, snapshot, tx)?;
        let (delta, remaps) = self.remap(delta, tx, kv)?;
        let (catalog, backfill) = match apply_schema_delta(&self.catalog, snapshot, &delta)? {
            Some(outcome) => (Arc::new(outcome.catalog), outcome.backfill),
            None => (Arc::clone(&self.catalog), Vec::new()),
        };
        let batch = build_batch(&catalog, &delta, tx, backfill);
        let keys = batch.len();

        if let Err(err) = self.backend.commit(batch) {
            tracing::error!(tx = %tx, error = %err, "commit failed");
            if err.is_corruption() {
                tracing::error!("disabling writes after storage corruption");
                self.poisoned = Some(err.to_string());
            }
            return Err(err.into());
        }

        for datom in &delta.asserts {
            self.ids.observe(datom.entity);
        }
        self.catalog = catalog;
        let published = Snapshot::new(self.backend.snapshot(), Arc::clone(&self.catalog), tx);
        self.shared.publish(published.clone());

        let asserted = delta
            .asserts
            .iter()
            .filter(|d| !(d.attribute == DB_TX_TIMESTAMP && d.entity == tx.as_entity()))
            .count();
        let retracted = delta.retracts.len();
        let elapsed = started.elapsed();
        tracing::debug!(tx = %tx, asserted, retracted, keys, ?elapsed, "committed");
        if elapsed > self.config.slow_transaction_threshold {
            tracing::warn!(tx = %tx, ?elapsed, keys, "slow transaction");
        }

        Ok(StoreResult {
            assigned_tx: tx,
            remaps,
            snapshot: published,
            asserted,
            retracted,
        })
    }

    /// Replaces temporary ids in entities and reference values.
    fn remap(
        &mut self,
        delta: Delta,
        tx: TxId,
        kv: &KvSnapshot,
    ) -> CoreResult<(Delta, std::collections::BTreeMap<EntityId, EntityId>)> {
        let mut remapper = TempIdRemapper::new(tx);
        let mut asserts = Vec::with_capacity(delta.asserts.len());
        for d in delta.asserts {
            let entity = remapper.resolve(d.entity, &mut self.ids, kv)?;
            let value = match d.value {
                TaggedValue::Reference(target) => {
                    TaggedValue::Reference(remapper.resolve(target, &mut self.ids, kv)?)
                }
                other => other,
            };
            asserts.push(Datom::assert(entity, d.attribute, value, d.tx));
        }
        let delta = Delta {
            retracts: delta.retracts,
            asserts,
        };
        Ok((delta, remapper.into_remaps()))
    }

    /// Replaces the whole store with validated import data.
    fn import(&mut self, data: ImportData) -> CoreResult<ImportSummary> {
        self.ensure_writable()?;
        let ImportData { entries, summary } = data;
        let mut batch = self.backend.create_batch();
        batch.clear_all();
        for (key, value) in entries {
            batch.put(key, value);
        }
        if let Err(err) = self.backend.commit(batch) {
            tracing::error!(error = %err, "import failed");
            if err.is_corruption() {
                self.poisoned = Some(err.to_string());
            }
            return Err(err.into());
        }

        let kv = self.backend.snapshot();
        self.ids.reset();
        match last_tx(&kv) {
            Some(basis) => {
                self.catalog = Arc::new(AttributeCatalog::load(&kv)?);
                self.shared
                    .publish(Snapshot::new(kv, Arc::clone(&self.catalog), basis));
            }
            None => {
                self.catalog = Arc::new(AttributeCatalog::with_builtins());
                self.shared
                    .publish(Snapshot::new(kv, Arc::clone(&self.catalog), TxId::new(0)));
                self.bootstrap()?;
            }
        }
        tracing::info!(entries = summary.entries, chunks = summary.chunks, "import complete");
        Ok(summary)
    }
}
