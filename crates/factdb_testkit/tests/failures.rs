//! How the writer reacts to failed backend commits.

use factdb_codec::{TaggedValue, ValueTag};
use factdb_core::{AttributeRecord, CoreError, Store, Transaction};
use factdb_storage::StorageError;
use factdb_testkit::prelude::*;
use std::sync::Arc;

async fn faulty_store() -> (Store, Arc<FaultyBackend>, People) {
    let backend = Arc::new(FaultyBackend::new());
    let store = Store::open(TestStore::config(), backend.clone()).unwrap();
    let people = People::register(&store).await;
    (store, backend, people)
}

fn named(people: People, name: &str) -> (Transaction, factdb_codec::EntityId) {
    let mut tx = Transaction::new();
    let e = tx.temp_id();
    tx.add(e, people.name, name);
    (tx, e)
}

#[tokio::test]
async fn io_error_fails_one_transaction_only() {
    let (store, backend, people) = faulty_store().await;
    let basis = store.current_snapshot().basis();

    backend.fail_next_commit(Fault::Io);
    let (tx, _) = named(people, "Lost");
    let err = store.submit(tx).await.unwrap_err();
    assert!(matches!(err, CoreError::BackendFailure(StorageError::Io(_))), "{err}");
    assert!(!err.is_corruption());
    assert_eq!(store.current_snapshot().basis(), basis);
    assert!(store.current_snapshot().find(people.name, &"Lost".into()).unwrap().is_empty());

    // The writer keeps going and reuses the ids the failed commit held.
    let (tx, e) = named(people, "Kept");
    let result = store.submit(tx).await.unwrap();
    assert_eq!(result.assigned_tx.counter(), basis.counter() + 1);
    let kept = result.resolve(e).unwrap();
    assert_eq!(
        store.current_snapshot().value(kept, people.name).unwrap(),
        Some(TaggedValue::from("Kept"))
    );
    assert_eq!(backend.injected(), 1);
}

#[tokio::test]
async fn corruption_disables_writes() {
    let (store, backend, people) = faulty_store().await;
    let alice = people.person(&store, "Alice").await;
    let basis = store.current_snapshot().basis();

    backend.fail_next_commit(Fault::Corruption);
    let (tx, _) = named(people, "Bob");
    let err = store.submit(tx).await.unwrap_err();
    assert!(err.is_corruption(), "{err}");

    let (tx, _) = named(people, "Carol");
    assert!(matches!(store.submit(tx).await, Err(CoreError::WritesDisabled { .. })));
    let err = store
        .register_attribute("person/nickname", AttributeRecord::new(ValueTag::Utf8))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::WritesDisabled { .. }));

    let mut stream = Vec::new();
    store.export(&mut stream).unwrap();
    assert!(matches!(store.import(&stream).await, Err(CoreError::WritesDisabled { .. })));

    // Reads keep working from the last good state.
    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.basis(), basis);
    assert_eq!(snapshot.value(alice, people.name).unwrap(), Some(TaggedValue::from("Alice")));
    assert_eq!(backend.injected(), 1);
}

#[tokio::test]
async fn known_attribute_registration_still_answers_after_corruption() {
    let (store, backend, people) = faulty_store().await;
    backend.fail_next_commit(Fault::Corruption);
    let (tx, _) = named(people, "Bob");
    store.submit(tx).await.unwrap_err();

    let id = store
        .register_attribute("person/name", AttributeRecord::new(ValueTag::Utf8).indexed())
        .await
        .unwrap();
    assert_eq!(id, people.name);
}
