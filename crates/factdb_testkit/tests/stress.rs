//! Concurrent submitters and readers against one store.

use factdb_codec::{EntityId, TxId};
use factdb_core::{CoreError, Snapshot, Transaction};
use factdb_testkit::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const SUBMITTERS: usize = 32;
const READERS: usize = 4;

fn users(snapshot: &Snapshot, people: People) -> usize {
    snapshot
        .datoms(&factdb_core::SliceDescriptor::attribute(people.name))
        .unwrap()
        .len()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_are_serialized() {
    let store = Arc::new(TestStore::memory());
    let people = People::register(&store).await;
    let before = store.current_snapshot();
    let start = before.basis();

    let submitters: Vec<_> = (0..SUBMITTERS)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut tx = Transaction::new();
                let e = tx.temp_id();
                tx.add(e, people.name, format!("user-{n}"));
                let result = store.submit(tx).await.unwrap();
                let entity = result.resolve(e).unwrap();
                // The result's snapshot already holds this commit.
                assert_eq!(result.snapshot.basis(), result.assigned_tx);
                assert!(result.snapshot.value(entity, people.name).unwrap().is_some());
                (result.assigned_tx, entity)
            })
        })
        .collect();

    // Readers pinned to the old state keep seeing it while commits land.
    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let pinned = before.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    assert_eq!(pinned.basis(), start);
                    assert_eq!(users(&pinned, people), 0);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let mut txs = BTreeSet::new();
    let mut entities = BTreeSet::new();
    for handle in submitters {
        let (tx, entity): (TxId, EntityId) = handle.await.unwrap();
        txs.insert(tx);
        entities.insert(entity);
    }
    for handle in readers {
        handle.await.unwrap();
    }

    assert_eq!(txs.len(), SUBMITTERS);
    assert_eq!(entities.len(), SUBMITTERS);
    let expected: BTreeSet<_> = (1..=SUBMITTERS as u64)
        .map(|n| TxId::from_counter(start.counter() + n))
        .collect();
    assert_eq!(txs, expected);

    let now = store.current_snapshot();
    assert_eq!(now.basis(), TxId::from_counter(start.counter() + SUBMITTERS as u64));
    assert_eq!(users(&now, people), SUBMITTERS);
    assert_eq!(users(&before, people), 0);
    assert_eq!(users(&store.as_of(start), people), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_claims_on_a_unique_value_admit_one_winner() {
    let store = Arc::new(TestStore::memory());
    let people = People::register(&store).await;

    let claims: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut tx = Transaction::new();
                let e = tx.temp_id();
                tx.add(e, people.email, "admin@example.com");
                store.submit(tx).await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in claims {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(CoreError::UniqueConstraintViolation { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(
        store
            .current_snapshot()
            .find(people.email, &"admin@example.com".into())
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revisions_observe_concurrent_commits_in_order() {
    let store = Arc::new(TestStore::memory());
    let people = People::register(&store).await;
    let start = store.current_snapshot().basis();
    let mut revisions = store.revisions();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        let target = TxId::from_counter(start.counter() + 8);
        loop {
            revisions.changed().await.unwrap();
            let basis = revisions.borrow_and_update().basis();
            seen.push(basis);
            if basis == target {
                return seen;
            }
        }
    });

    let submitters: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut tx = Transaction::new();
                let e = tx.temp_id();
                tx.add(e, people.name, format!("watched-{n}"));
                store.submit(tx).await.unwrap()
            })
        })
        .collect();
    for handle in submitters {
        handle.await.unwrap();
    }

    let seen = watcher.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    assert!(seen.iter().all(|&tx| tx > start));
}
