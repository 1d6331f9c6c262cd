//! Concurrency test for invariant 8 (dedupe atomicity): two concurrent
//! `is_duplicate_event` calls on a fresh event id must return `false`
//! exactly once, even when they race against the same sqlite file.

use letta_matrix_bridge::store::StateStore;

async fn fresh_store() -> StateStore {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.sqlite3");
    std::mem::forget(dir);
    StateStore::open(&path).await.unwrap()
}

#[tokio::test]
#[serial_test::serial]
async fn concurrent_dedupe_checks_report_new_exactly_once() {
    let store = std::sync::Arc::new(fresh_store().await);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.is_duplicate_event("$race-event").await.unwrap() }));
    }

    let results: Vec<bool> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let new_count = results.iter().filter(|&&is_duplicate| !is_duplicate).count();
    assert_eq!(new_count, 1, "exactly one concurrent caller should see a fresh event");
}

#[tokio::test]
#[serial_test::serial]
async fn concurrent_dedupe_checks_on_distinct_ids_all_see_new() {
    let store = std::sync::Arc::new(fresh_store().await);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.is_duplicate_event(&format!("$event-{i}")).await.unwrap() })
        })
        .collect();

    let results: Vec<bool> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(results.iter().all(|&is_duplicate| !is_duplicate), "distinct ids must never collide");
}
