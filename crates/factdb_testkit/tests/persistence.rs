//! Journal replay, corruption detection and directory locking.

use factdb_codec::{TaggedValue, ValueTag};
use factdb_core::{AttributeRecord, CoreError, Transaction};
use factdb_storage::{FileBackend, StorageError};
use factdb_testkit::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;

#[tokio::test]
async fn reopened_store_keeps_facts_and_counters() {
    let store = TestStore::file();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let mut tx = Transaction::new();
    tx.add(alice, people.age, 30i64).add(alice, people.tag, "admin");
    let before = commit(&store, tx).await.assigned_tx;

    let store = store.reopen();
    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.basis(), before);
    assert_eq!(snapshot.value(alice, people.age).unwrap(), Some(TaggedValue::Int64(30)));
    assert_eq!(snapshot.catalog().get("person/email"), Some(people.email));

    let bob = people.person(&store, "Bob").await;
    assert!(bob.counter() > alice.counter());
    assert!(store.current_snapshot().basis() > before);
}

#[tokio::test]
async fn registration_after_reopen_does_not_reuse_ids() {
    let store = TestStore::file();
    let people = People::register(&store).await;
    let store = store.reopen();
    let id = store
        .register_attribute("person/nickname", AttributeRecord::new(ValueTag::Utf8))
        .await
        .unwrap();
    assert!(id > people.photo);
}

#[tokio::test]
async fn flipped_journal_byte_is_reported_as_corruption() {
    let store = TestStore::file();
    let people = People::register(&store).await;
    people.person(&store, "Alice").await;
    let dir = store.close();
    let path = dir.path().join("store");
    let journal = path.join("journal.log");

    // Inside the payload of the first record.
    let mut bytes = std::fs::read(&journal).unwrap();
    bytes[12] ^= 0xFF;
    std::fs::write(&journal, &bytes).unwrap();

    let err = open_dir(&path).unwrap_err();
    assert!(err.is_corruption(), "expected corruption, got {err}");
}

#[tokio::test]
async fn second_open_of_the_same_directory_is_refused() {
    let store = TestStore::file();
    let path = store.path().unwrap();
    let err = open_dir(&path).unwrap_err();
    assert!(matches!(err, CoreError::BackendFailure(StorageError::Locked)));

    drop(store.close());
}

#[tokio::test]
async fn torn_tail_is_dropped_on_replay() {
    let store = TestStore::file();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let basis = store.current_snapshot().basis();
    let dir = store.close();
    let path = dir.path().join("store");

    // A crash in the middle of a record header.
    OpenOptions::new()
        .append(true)
        .open(path.join("journal.log"))
        .unwrap()
        .write_all(b"FDB")
        .unwrap();

    let store = open_dir(&path).unwrap();
    assert_eq!(store.current_snapshot().basis(), basis);
    assert_eq!(
        store.current_snapshot().value(alice, people.name).unwrap(),
        Some(TaggedValue::from("Alice"))
    );

    // The trimmed journal accepts new records and replays cleanly.
    people.person(&store, "Bob").await;
    drop(store);
    let store = open_dir(&path).unwrap();
    assert_eq!(store.current_snapshot().find(people.name, &"Bob".into()).unwrap().len(), 1);
}

#[tokio::test]
async fn compaction_keeps_current_and_historical_state() {
    let store = TestStore::file();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    for age in 0..20i64 {
        let mut tx = Transaction::new();
        tx.add(alice, people.age, age);
        commit(&store, tx).await;
    }
    let history = store.current_snapshot().history(alice, people.age).unwrap();
    let basis = store.current_snapshot().basis();
    let dir = store.close();
    let path = dir.path().join("store");

    let options = factdb_core::backend_options(&TestStore::config());
    let backend = FileBackend::open(&path, options, false).unwrap();
    let before = backend.journal_len();
    let after = backend.compact().unwrap();
    assert!(after < before);
    drop(backend);

    let store = open_dir(&path).unwrap();
    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.basis(), basis);
    assert_eq!(snapshot.value(alice, people.age).unwrap(), Some(TaggedValue::Int64(19)));
    assert_eq!(snapshot.history(alice, people.age).unwrap(), history);
}
