//! Export streams and imports between stores.

use factdb_codec::{IndexFamily, IndexType, TaggedValue, TxId};
use factdb_core::{CoreError, SliceDescriptor, Store, Transaction, EXPORT_MAGIC, EXPORT_VERSION};
use factdb_testkit::prelude::*;

fn exported(store: &Store) -> Vec<u8> {
    let mut out = Vec::new();
    store.export(&mut out).unwrap();
    out
}

async fn populated() -> (TestStore, People) {
    let store = TestStore::file();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let bob = people.person(&store, "Bob").await;

    let mut tx = Transaction::new();
    tx.add(alice, people.email, "alice@example.com")
        .add(alice, people.friend, bob)
        .add(alice, people.tag, "admin")
        .add(alice, people.photo, TaggedValue::HashedBlob(vec![0xAB; 4096]))
        .add(bob, people.status, "away");
    commit(&store, tx).await;

    let mut tx = Transaction::new();
    tx.add(alice, people.name, "Alicia")
        .retract(alice, people.tag, "admin")
        .add(bob, people.status, "online");
    commit(&store, tx).await;
    (store, people)
}

#[tokio::test]
async fn import_reproduces_every_index() {
    let (source, people) = populated().await;
    let stream = exported(&source);

    let target = TestStore::memory();
    let summary = target.import(&stream).await.unwrap();
    let expected = source.current_snapshot();
    let actual = target.current_snapshot();

    assert_eq!(actual.basis(), expected.basis());
    assert_eq!(summary.entries, IndexType::STORED.iter().map(|&i| expected.index_len(i)).sum::<usize>());
    for index in IndexType::STORED {
        assert_eq!(actual.index_len(index), expected.index_len(index), "{}", index.name());
    }
    for family in IndexFamily::ALL {
        let slice = SliceDescriptor::all(family);
        assert_eq!(
            actual.history_view().datoms(&slice).unwrap(),
            expected.history_view().datoms(&slice).unwrap(),
            "{}",
            family.name()
        );
    }
    assert_eq!(actual.catalog().get("person/photo"), Some(people.photo));
}

#[tokio::test]
async fn blobs_and_time_travel_survive_import() {
    let (source, people) = populated().await;
    let alice = source.current_snapshot().find(people.email, &"alice@example.com".into()).unwrap()[0];
    let stream = exported(&source);

    let target = TestStore::memory();
    target.import(&stream).await.unwrap();
    let snapshot = target.current_snapshot();
    assert_eq!(
        snapshot.value(alice, people.photo).unwrap(),
        Some(TaggedValue::HashedBlob(vec![0xAB; 4096]))
    );

    let before_rename = TxId::from_counter(snapshot.basis().counter() - 1);
    let past = target.as_of(before_rename);
    assert_eq!(past.value(alice, people.name).unwrap(), Some("Alice".into()));
    assert_eq!(past.values(alice, people.tag).unwrap(), vec![TaggedValue::from("admin")]);
}

#[tokio::test]
async fn import_replaces_existing_contents() {
    let (source, people) = populated().await;
    let stream = exported(&source);

    let target = TestStore::memory();
    let other = People::register(&target).await;
    other.person(&target, "Carol").await;
    target.import(&stream).await.unwrap();

    let snapshot = target.current_snapshot();
    assert!(snapshot.find(people.name, &"Carol".into()).unwrap().is_empty());
    assert!(snapshot.history_view().find(people.name, &"Carol".into()).unwrap().is_empty());
    assert_eq!(snapshot.find(people.name, &"Alicia".into()).unwrap().len(), 1);
}

#[tokio::test]
async fn new_writes_after_import_use_fresh_ids() {
    let (source, people) = populated().await;
    let stream = exported(&source);
    let existing: Vec<_> = source
        .current_snapshot()
        .datoms(&SliceDescriptor::attribute(people.name))
        .unwrap()
        .into_iter()
        .map(|d| d.entity)
        .collect();

    let target = TestStore::memory();
    target.import(&stream).await.unwrap();
    let basis = target.current_snapshot().basis();
    let dave = people.person(&target, "Dave").await;
    assert!(!existing.contains(&dave));
    assert!(target.current_snapshot().basis() > basis);
}

#[tokio::test]
async fn header_only_stream_leaves_a_bootstrapped_store() {
    let mut stream = EXPORT_MAGIC.to_vec();
    stream.extend_from_slice(&EXPORT_VERSION.to_le_bytes());

    let target = TestStore::memory();
    People::register(&target).await;
    let summary = target.import(&stream).await.unwrap();
    assert_eq!(summary.entries, 0);

    let snapshot = target.current_snapshot();
    assert_eq!(snapshot.basis(), TxId::from_counter(1));
    assert_eq!(snapshot.catalog().get("person/name"), None);
    assert!(snapshot.catalog().get("db/ident").is_some());
}

#[tokio::test]
async fn rejected_streams_change_nothing() {
    let (source, people) = populated().await;
    let stream = exported(&source);
    let target = TestStore::memory();
    let mine = People::register(&target).await;
    let carol = mine.person(&target, "Carol").await;
    let basis = target.current_snapshot().basis();

    let mut bad_magic = stream.clone();
    bad_magic[0] ^= 0xFF;
    let mut bad_version = stream.clone();
    bad_version[5] = bad_version[5].wrapping_add(1);
    let truncated = stream[..stream.len() - 3].to_vec();

    for data in [bad_magic, bad_version, truncated] {
        let err = target.import(&data).await.unwrap_err();
        assert!(matches!(err, CoreError::CorruptImport { .. }), "{err}");
        let snapshot = target.current_snapshot();
        assert_eq!(snapshot.basis(), basis);
        assert_eq!(snapshot.value(carol, mine.name).unwrap(), Some("Carol".into()));
    }
    assert_eq!(people.name, mine.name);
}

#[tokio::test]
async fn large_indexes_export_in_several_chunks() {
    let store = TestStore::memory();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let mut tx = Transaction::new();
    for n in 0..factdb_core::MAX_CHUNK_ENTRIES {
        tx.add(alice, people.tag, format!("tag-{n}"));
    }
    commit(&store, tx).await;

    let mut stream = Vec::new();
    let summary = store.export(&mut stream).unwrap();
    let eavt = summary.per_index[&IndexType::EAVTCurrent];
    assert!(eavt > factdb_core::MAX_CHUNK_ENTRIES);
    assert!(summary.chunks > summary.per_index.len());

    let target = TestStore::memory();
    let imported = target.import(&stream).await.unwrap();
    assert_eq!(imported.entries, summary.entries);
    assert_eq!(imported.chunks, summary.chunks);
    assert_eq!(
        target.current_snapshot().values(alice, people.tag).unwrap().len(),
        factdb_core::MAX_CHUNK_ENTRIES
    );
}
