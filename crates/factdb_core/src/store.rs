//! The store facade.

use crate::attribute::{
    AttributeRecord, Cardinality, DB_CARDINALITY, DB_IDENT, DB_INDEXED, DB_NO_HISTORY, DB_UNIQUE,
};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::export::{self, ExportSummary, ImportSummary};
use crate::snapshot::{SliceDescriptor, Snapshot, View};
use crate::transaction::{ScanAction, ScanUpdate, Transaction};
use crate::writer::{Request, Shared, Writer};
use factdb_codec::{
    compare_keys, key_prefix, AttributeId, Datom, EntityId, IndexType, TaggedValue, TxId,
};
use factdb_storage::{BackendOptions, FileBackend, InMemoryBackend, KvBackend};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot, watch};

/// Outcome of a committed transaction.
#[derive(Debug, Clone)]
pub struct StoreResult {
    /// Id of the transaction.
    pub assigned_tx: TxId,
    /// Permanent id of every temporary id the transaction used.
    pub remaps: BTreeMap<EntityId, EntityId>,
    /// Snapshot right after the commit.
    pub snapshot: Snapshot,
    /// Datoms asserted, not counting the transaction timestamp.
    pub asserted: usize,
    /// Stored datoms the transaction retracted.
    pub retracted: usize,
}

impl StoreResult {
    /// Permanent id of `temp`, if the transaction allocated one.
    #[must_use]
    pub fn resolve(&self, temp: EntityId) -> Option<EntityId> {
        self.remaps.get(&temp).copied()
    }
}

/// Changes to an existing attribute's flags.
///
/// Unset fields are left alone. The value type can never change.
///
/// ```
/// use factdb_core::{Cardinality, SchemaChange};
///
/// let change = SchemaChange::new("person/email").unique(true).cardinality(Cardinality::One);
/// assert_eq!(change.ident(), "person/email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    ident: String,
    rename: Option<String>,
    cardinality: Option<Cardinality>,
    indexed: Option<bool>,
    unique: Option<bool>,
    no_history: Option<bool>,
}

impl SchemaChange {
    /// Starts a change to the attribute named `ident`.
    #[must_use]
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            rename: None,
            cardinality: None,
            indexed: None,
            unique: None,
            no_history: None,
        }
    }

    /// The attribute being changed.
    #[must_use]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Gives the attribute a new ident.
    #[must_use]
    pub fn rename(mut self, ident: impl Into<String>) -> Self {
        self.rename = Some(ident.into());
        self
    }

    /// Sets the cardinality.
    #[must_use]
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Adds or drops the AVET index. Dropping it also drops uniqueness.
    #[must_use]
    pub fn indexed(mut self, on: bool) -> Self {
        self.indexed = Some(on);
        if !on {
            self.unique = Some(false);
        }
        self
    }

    /// Sets uniqueness. Turning it on also indexes the attribute.
    #[must_use]
    pub fn unique(mut self, on: bool) -> Self {
        self.unique = Some(on);
        if on {
            self.indexed = Some(true);
        }
        self
    }

    /// Sets whether superseded values are kept.
    #[must_use]
    pub fn no_history(mut self, on: bool) -> Self {
        self.no_history = Some(on);
        self
    }

    /// The transaction that applies this change to attribute `id`.
    fn into_transaction(self, id: AttributeId) -> Transaction {
        let e = id.entity_id();
        let mut tx = Transaction::new();
        if let Some(ident) = self.rename {
            tx.add(e, DB_IDENT, ident);
        }
        if let Some(cardinality) = self.cardinality {
            tx.add(e, DB_CARDINALITY, TaggedValue::UInt8(cardinality.as_u8()));
        }
        for (attribute, flag) in [
            (DB_INDEXED, self.indexed),
            (DB_UNIQUE, self.unique),
            (DB_NO_HISTORY, self.no_history),
        ] {
            if let Some(on) = flag {
                tx.add(e, attribute, on);
            }
        }
        tx
    }
}

/// Options every store backend is opened with.
#[must_use]
pub fn backend_options(config: &StoreConfig) -> BackendOptions {
    BackendOptions::new()
        .comparator(compare_keys)
        .prefix_extractor(key_prefix)
        .sync_on_commit(config.sync_on_commit)
}

/// An embedded datom store.
///
/// Reads go straight to immutable snapshots and never wait. Writes are
/// queued on a single writer thread and applied in arrival order.
///
/// ```
/// use factdb_core::{AttributeRecord, Store, StoreConfig, Transaction};
/// use factdb_codec::ValueTag;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # rt.block_on(async {
/// let store = Store::open_in_memory(StoreConfig::default()).unwrap();
/// let name = store
///     .register_attribute("person/name", AttributeRecord::new(ValueTag::Utf8))
///     .await
///     .unwrap();
///
/// let mut tx = Transaction::new();
/// let alice = tx.temp_id();
/// tx.add(alice, name, "Alice");
/// let result = store.submit(tx).await.unwrap();
///
/// let alice = result.resolve(alice).unwrap();
/// let value = store.current_snapshot().value(alice, name).unwrap();
/// assert_eq!(value.as_ref().and_then(|v| v.as_str()), Some("Alice"));
/// # });
/// ```
pub struct Store {
    config: StoreConfig,
    backend: Arc<dyn KvBackend>,
    shared: Arc<Shared>,
    sender: mpsc::UnboundedSender<Request>,
    handle: Option<JoinHandle<()>>,
}

impl Store {
    /// Opens a store over `backend`, bootstrapping it if it is empty.
    ///
    /// The backend must have been created with [`backend_options`].
    ///
    /// # Errors
    ///
    /// Fails if the stored catalog can't be loaded or the writer thread
    /// can't be started.
    pub fn open(config: StoreConfig, backend: Arc<dyn KvBackend>) -> CoreResult<Self> {
        for index in IndexType::STORED {
            backend.declare_index(index.as_byte(), index.name())?;
        }
        let writer = Writer::open(Arc::clone(&backend), config.clone())?;
        let shared = writer.shared();
        let (sender, handle) = writer.spawn()?;
        Ok(Self {
            config,
            backend,
            shared,
            sender,
            handle: Some(handle),
        })
    }

    /// Opens a fresh store held entirely in memory.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub fn open_in_memory(config: StoreConfig) -> CoreResult<Self> {
        let backend = InMemoryBackend::new(backend_options(&config));
        Self::open(config, Arc::new(backend))
    }

    /// Opens a store journaled in directory `path`.
    ///
    /// # Errors
    ///
    /// Fails if the directory is missing (and `create_if_missing` is off),
    /// locked by another process, or holds a corrupt journal.
    pub fn open_dir(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let backend = FileBackend::open(path, backend_options(&config), config.create_if_missing)?;
        tracing::info!(path = %path.display(), "opened file backend");
        Self::open(config, Arc::new(backend))
    }

    /// The configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The backend underneath this store.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<CoreResult<T>>) -> Request,
    ) -> CoreResult<T> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(build(reply))
            .map_err(|_| CoreError::StoreClosed)?;
        let timeout = self.config.transaction_timeout;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::StoreClosed),
            Err(_) => {
                tracing::warn!(?timeout, "gave up waiting for the writer");
                Err(CoreError::TransactionTimeout { timeout })
            }
        }
    }

    /// Queues `tx` and waits for it to commit.
    ///
    /// # Errors
    ///
    /// Returns the normalization or storage error that failed the
    /// transaction, or [`CoreError::TransactionTimeout`] if the writer did
    /// not answer in time. A timed-out transaction may still commit.
    pub async fn submit(&self, tx: Transaction) -> CoreResult<StoreResult> {
        self.request(|reply| Request::Submit { tx, reply }).await
    }

    /// Defines an attribute, or returns the id it already has.
    ///
    /// # Errors
    ///
    /// Fails if the attribute id space is exhausted or the commit fails.
    pub async fn register_attribute(
        &self,
        ident: impl Into<String>,
        record: AttributeRecord,
    ) -> CoreResult<AttributeId> {
        let ident = ident.into();
        self.request(|reply| Request::RegisterAttribute {
            ident,
            record,
            reply,
        })
        .await
    }

    /// Changes the flags of an existing attribute.
    ///
    /// Indexing backfills AVET from existing datoms in the same commit.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::UnknownAttributeIdent`] for an unknown
    /// attribute, and rejects transitions existing data can't satisfy.
    pub async fn update_schema(&self, change: SchemaChange) -> CoreResult<StoreResult> {
        let id = self.shared.current().catalog().resolve(change.ident())?;
        self.submit(change.into_transaction(id)).await
    }

    /// The latest committed state.
    #[must_use]
    pub fn current_snapshot(&self) -> Snapshot {
        self.shared.current()
    }

    /// Rewrites current datoms of `slice` in one transaction.
    ///
    /// `function` runs on the writer thread against the latest state. See
    /// [`ScanUpdate`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::submit`].
    pub async fn scan_update<F>(&self, slice: SliceDescriptor, function: F) -> CoreResult<StoreResult>
    where
        F: FnMut(&Datom) -> ScanAction + Send + 'static,
    {
        let mut tx = Transaction::new();
        tx.call_function(ScanUpdate::new(slice, function));
        self.submit(tx).await
    }

    /// A stream of committed states.
    ///
    /// The receiver starts at the current snapshot and is marked changed
    /// after every commit and import. Slow receivers skip straight to the
    /// latest revision.
    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<Snapshot> {
        self.shared.subscribe()
    }

    /// The state right after `tx` committed.
    #[must_use]
    pub fn as_of(&self, tx: TxId) -> Snapshot {
        self.current_snapshot().with_view(View::AsOf(tx))
    }

    /// Every assertion and retraction ever made.
    #[must_use]
    pub fn history(&self) -> Snapshot {
        self.current_snapshot().with_view(View::History)
    }

    /// Writes every stored key of the current snapshot to `out`.
    ///
    /// # Errors
    ///
    /// Fails if writing to `out` fails.
    pub fn export<W: Write>(&self, out: &mut W) -> CoreResult<ExportSummary> {
        let snapshot = self.current_snapshot();
        let summary = export::export(snapshot.kv(), out)?;
        tracing::info!(
            basis = %snapshot.basis(),
            entries = summary.entries,
            chunks = summary.chunks,
            "export complete"
        );
        Ok(summary)
    }

    /// Replaces the store's contents with an export stream.
    ///
    /// The whole stream is validated first; on any error the store is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::CorruptImport`] on a malformed stream.
    pub async fn import(&self, data: &[u8]) -> CoreResult<ImportSummary> {
        let data = export::parse(data)?;
        self.request(|reply| Request::Import { data, reply }).await
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("basis", &self.shared.current().basis())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.sender.send(Request::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("writer thread panicked");
            }
        }
    }
}
