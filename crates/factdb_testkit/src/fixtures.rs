//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and the
//! small people schema most integration tests share.

use factdb_codec::{AttributeId, EntityId, ValueTag};
use factdb_core::{AttributeRecord, Store, StoreConfig, StoreResult, Transaction};
use std::path::Path;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Config used by every fixture: no fsync, short timeout.
    #[must_use]
    pub fn config() -> StoreConfig {
        StoreConfig::default()
            .sync_on_commit(false)
            .transaction_timeout(std::time::Duration::from_secs(30))
    }

    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Store::open_in_memory(Self::config()).expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a new store journaled in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open_dir(&temp_dir.path().join("store"), Self::config())
            .expect("Failed to open file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("store"))
    }

    /// Closes and reopens a file store, replaying its journal.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, which cannot be reopened.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self { store, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only file stores can be reopened");
        drop(store);
        let store = Store::open_dir(&temp_dir.path().join("store"), Self::config())
            .expect("Failed to reopen file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Closes a file store and hands back its directory, still on disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    #[must_use]
    pub fn close(self) -> TempDir {
        let Self { store, temp_dir } = self;
        drop(store);
        temp_dir.expect("Only file stores can be closed into a directory")
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Opens a file store at an explicit path with the fixture config.
pub fn open_dir(path: &Path) -> factdb_core::CoreResult<Store> {
    Store::open_dir(path, TestStore::config())
}

/// Attribute ids of the people schema.
#[derive(Debug, Clone, Copy)]
pub struct People {
    /// `person/name`: indexed text.
    pub name: AttributeId,
    /// `person/email`: unique text.
    pub email: AttributeId,
    /// `person/age`: i64.
    pub age: AttributeId,
    /// `person/friend`: many references.
    pub friend: AttributeId,
    /// `person/tag`: many texts.
    pub tag: AttributeId,
    /// `person/status`: text without history.
    pub status: AttributeId,
    /// `person/photo`: hashed blob.
    pub photo: AttributeId,
}

impl People {
    /// Registers the schema, one attribute per transaction.
    pub async fn register(store: &Store) -> Self {
        let attr = |ident: &'static str, record: AttributeRecord| async move {
            store
                .register_attribute(ident, record)
                .await
                .expect("Failed to register attribute")
        };
        Self {
            name: attr("person/name", AttributeRecord::new(ValueTag::Utf8).indexed()).await,
            email: attr("person/email", AttributeRecord::new(ValueTag::Utf8).unique()).await,
            age: attr("person/age", AttributeRecord::new(ValueTag::Int64)).await,
            friend: attr("person/friend", AttributeRecord::new(ValueTag::Reference).many()).await,
            tag: attr("person/tag", AttributeRecord::new(ValueTag::Utf8).many()).await,
            status: attr("person/status", AttributeRecord::new(ValueTag::Utf8).no_history()).await,
            photo: attr("person/photo", AttributeRecord::new(ValueTag::HashedBlob)).await,
        }
    }

    /// Creates a person named `name` and returns its permanent id.
    pub async fn person(&self, store: &Store, name: &str) -> EntityId {
        let mut tx = Transaction::new();
        let temp = tx.temp_id();
        tx.add(temp, self.name, name);
        let result = store.submit(tx).await.expect("Failed to create person");
        result.resolve(temp).expect("Temp id was not remapped")
    }
}

/// Submits `tx`, panicking on failure.
pub async fn commit(store: &Store, tx: Transaction) -> StoreResult {
    store.submit(tx).await.expect("Transaction failed")
}
