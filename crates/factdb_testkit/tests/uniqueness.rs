//! Unique attributes: conflicts and ownership transfer.

use factdb_codec::{TaggedValue, TxId};
use factdb_core::{CoreError, Transaction};
use factdb_testkit::prelude::*;

#[tokio::test]
async fn second_owner_is_rejected() {
    let store = TestStore::memory();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let bob = people.person(&store, "Bob").await;

    let mut tx = Transaction::new();
    tx.add(alice, people.email, "shared@example.com");
    commit(&store, tx).await;

    let basis = store.current_snapshot().basis();
    let mut tx = Transaction::new();
    tx.add(bob, people.email, "shared@example.com");
    let err = store.submit(tx).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::UniqueConstraintViolation { existing, conflicting, .. }
            if existing == alice && conflicting == bob
    ));
    assert_eq!(store.current_snapshot().basis(), basis);
}

#[tokio::test]
async fn two_new_entities_cannot_share_a_value() {
    let store = TestStore::memory();
    let people = People::register(&store).await;

    let mut tx = Transaction::new();
    let a = tx.temp_id();
    let b = tx.temp_id();
    tx.add(a, people.email, "dup@example.com").add(b, people.email, "dup@example.com");
    let err = store.submit(tx).await.unwrap_err();
    assert!(matches!(err, CoreError::UniqueConstraintViolation { .. }));
}

#[tokio::test]
async fn value_moves_when_released_in_the_same_transaction() {
    let store = TestStore::memory();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;
    let bob = people.person(&store, "Bob").await;
    let email = TaggedValue::from("moving@example.com");

    let mut tx = Transaction::new();
    tx.add(alice, people.email, email.clone());
    commit(&store, tx).await;

    let mut tx = Transaction::new();
    tx.retract(alice, people.email, email.clone()).add(bob, people.email, email.clone());
    let result = commit(&store, tx).await;
    assert_eq!((result.asserted, result.retracted), (1, 1));

    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.find(people.email, &email).unwrap(), vec![bob]);
    assert_eq!(snapshot.value(alice, people.email).unwrap(), None);

    let before = store.as_of(TxId::from_counter(result.assigned_tx.counter() - 1));
    assert_eq!(before.find(people.email, &email).unwrap(), vec![alice]);
}

#[tokio::test]
async fn replacing_own_value_is_allowed() {
    let store = TestStore::memory();
    let people = People::register(&store).await;
    let alice = people.person(&store, "Alice").await;

    for email in ["a@example.com", "a@example.com", "b@example.com"] {
        let mut tx = Transaction::new();
        tx.add(alice, people.email, email);
        commit(&store, tx).await;
    }
    let snapshot = store.current_snapshot();
    assert_eq!(snapshot.value(alice, people.email).unwrap(), Some(TaggedValue::from("b@example.com")));
    assert!(snapshot.find(people.email, &TaggedValue::from("a@example.com")).unwrap().is_empty());
}
