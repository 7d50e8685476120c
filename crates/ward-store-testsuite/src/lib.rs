//! Backend-conformance suite shared by every [`ward_core::Store`]
//! implementation.
//!
//! Each backend's own test module calls [`run_compliance_tests`] against a
//! fresh, empty store so each scenario is only written once.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use ward_core::{AcquireParams, ControlFlow, ListFilter, Status, Store, StoreError};

fn params(namespace: &str, name: &str, owner: &str, ttl: Duration) -> AcquireParams {
    AcquireParams {
        owner: owner.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        expires_at: Utc::now() + ttl,
        metadata: HashMap::new(),
    }
}

/// Runs every end-to-end scenario and boundary behavior a conformant
/// against `store`. `store` must be empty of records relevant to the
/// namespace/name pairs used below (a fresh backend instance per call).
pub async fn run_compliance_tests(store: &dyn Store) {
    exclusive_acquire(store).await;
    takeover_on_expiry(store).await;
    terminal_done(store).await;
    metadata_merge(store).await;
    list_filters(store).await;
    boundary_behaviors(store).await;
}

/// Scenario 1: exclusive acquire.
async fn exclusive_acquire(store: &dyn Store) {
    let record = store
        .acquire(params("", "res", "owner-a", Duration::from_secs(60)))
        .await
        .expect("first acquire succeeds");
    assert_eq!(record.num_acquired, 1);
    assert_eq!(record.owner, "owner-a");

    let err = store
        .acquire(params("", "res", "owner-a", Duration::from_secs(60)))
        .await
        .expect_err("re-acquire by the same owner while alive is still held");
    assert!(matches!(err, StoreError::Acquired));

    let err = store
        .acquire(params("", "res", "owner-b", Duration::from_secs(60)))
        .await
        .expect_err("acquire by a different owner while alive is held");
    assert!(matches!(err, StoreError::Acquired));
}

/// Scenario 2: takeover on expiry.
async fn takeover_on_expiry(store: &dyn Store) {
    let first = store
        .acquire(params("", "expiring", "owner-a", Duration::from_secs(60)))
        .await
        .unwrap();

    // Release immediately via a past-expiry renew (same mechanism `discard` uses).
    store
        .renew(
            "owner-a",
            first.id,
            Utc::now() - Duration::from_secs(1),
            HashMap::new(),
        )
        .await
        .unwrap();

    let second = store
        .acquire(params("", "expiring", "owner-b", Duration::from_secs(60)))
        .await
        .expect("acquire of an expired lease succeeds");
    assert_ne!(second.id, first.id);
    assert_eq!(second.num_acquired, 2);
    assert_eq!(second.owner, "owner-b");
}

/// Scenario 3: terminal done.
async fn terminal_done(store: &dyn Store) {
    let handle = store
        .acquire(params("", "terminal", "owner-a", Duration::from_secs(60)))
        .await
        .unwrap();
    store
        .done("owner-a", handle.id, HashMap::new())
        .await
        .unwrap();

    let err = store
        .acquire(params("", "terminal", "owner-a", Duration::from_secs(60)))
        .await
        .expect_err("acquire of a done resource by its prior owner is still done");
    assert!(matches!(err, StoreError::Done));

    let err = store
        .acquire(params("", "terminal", "owner-b", Duration::from_secs(60)))
        .await
        .expect_err("acquire of a done resource by anyone is done");
    assert!(matches!(err, StoreError::Done));

    // A second done/renew against the now-done handle always fails, even
    // for the original owner.
    let err = store
        .done("owner-a", handle.id, HashMap::new())
        .await
        .expect_err("double done is invalid");
    assert!(matches!(err, StoreError::InvalidHandle));
    let err = store
        .renew(
            "owner-a",
            handle.id,
            Utc::now() + Duration::from_secs(60),
            HashMap::new(),
        )
        .await
        .expect_err("renew of a done handle is invalid");
    assert!(matches!(err, StoreError::InvalidHandle));

    // A foreign owner can't renew even a still-alive handle.
    let alive = store
        .acquire(params("", "foreign", "owner-a", Duration::from_secs(60)))
        .await
        .unwrap();
    let err = store
        .renew(
            "owner-b",
            alive.id,
            Utc::now() + Duration::from_secs(60),
            HashMap::new(),
        )
        .await
        .expect_err("renew by a foreign owner is invalid");
    assert!(matches!(err, StoreError::InvalidHandle));
}

/// Scenario 4: metadata merge across acquire/renew/done.
async fn metadata_merge(store: &dyn Store) {
    let mut meta = HashMap::new();
    meta.insert("k".to_string(), "v".to_string());
    let mut p = params("", "merge", "owner-a", Duration::from_secs(60));
    p.metadata = meta;
    let handle = store.acquire(p).await.unwrap();

    let mut renew_meta = HashMap::new();
    renew_meta.insert("l".to_string(), "w".to_string());
    store
        .renew(
            "owner-a",
            handle.id,
            Utc::now() + Duration::from_secs(60),
            renew_meta,
        )
        .await
        .unwrap();

    let mut done_meta = HashMap::new();
    done_meta.insert("k".to_string(), "v2".to_string());
    store.done("owner-a", handle.id, done_meta).await.unwrap();

    let stored = store.get(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.metadata.get("k").map(String::as_str), Some("v2"));
    assert_eq!(stored.metadata.get("l").map(String::as_str), Some("w"));
    assert!(stored.is_done());
}

/// Scenario 5: list filters (prefix, status, offset, metadata).
async fn list_filters(store: &dyn Store) {
    let r1 = store
        .acquire(params("a/b", "r1", "owner-a", Duration::from_secs(60)))
        .await
        .unwrap();
    let r2 = store
        .acquire(params("a/b/c", "r2", "owner-a", Duration::from_secs(60)))
        .await
        .unwrap();
    let mut tagged = params("a/x", "r3", "owner-a", Duration::from_secs(60));
    tagged.metadata.insert("a".to_string(), "1".to_string());
    let r3 = store.acquire(tagged).await.unwrap();

    store.done("owner-a", r2.id, HashMap::new()).await.unwrap();
    store.done("owner-a", r3.id, HashMap::new()).await.unwrap();

    let names = collect_names(store, ListFilter::default(), 0).await;
    assert_eq!(names, vec!["r3", "r2", "r1"]);

    let done = collect_names(
        store,
        ListFilter {
            status: Status::Done,
            ..Default::default()
        },
        0,
    )
    .await;
    assert_eq!(done.len(), 2);

    let prefixed = collect_names(
        store,
        ListFilter {
            prefix: "a/b".to_string(),
            ..Default::default()
        },
        0,
    )
    .await;
    assert_eq!(prefixed.len(), 2);

    let offsetted = collect_names(store, ListFilter::default(), 2).await;
    assert_eq!(offsetted, vec!["r1"]);

    let mut meta_filter = HashMap::new();
    meta_filter.insert("a".to_string(), "1".to_string());
    let by_meta = collect_names(
        store,
        ListFilter {
            metadata: meta_filter,
            ..Default::default()
        },
        0,
    )
    .await;
    assert_eq!(by_meta, vec!["r3"]);
    let _ = r1;
}

async fn collect_names(store: &dyn Store, filter: ListFilter, offset: u64) -> Vec<String> {
    let mut names = Vec::new();
    let mut sink = |record: ward_core::HandleRecord| {
        names.push(record.name);
        ControlFlow::Continue
    };
    store.list(filter, offset, &mut sink).await.unwrap();
    names
}

/// Boundary behaviors: out-of-range offset, non-matching prefix, and the
/// stop sentinel halting iteration after exactly one item.
async fn boundary_behaviors(store: &dyn Store) {
    store
        .acquire(params(
            "boundary",
            "only",
            "owner-a",
            Duration::from_secs(60),
        ))
        .await
        .unwrap();

    let huge_offset = collect_names(store, ListFilter::default(), 10_000).await;
    assert!(huge_offset.is_empty());

    let no_prefix_match = collect_names(
        store,
        ListFilter {
            prefix: "no-such-namespace".to_string(),
            ..Default::default()
        },
        0,
    )
    .await;
    assert!(no_prefix_match.is_empty());

    let mut seen = 0u32;
    let mut stop_after_first = |_record: ward_core::HandleRecord| {
        seen += 1;
        ControlFlow::Break
    };
    store
        .list(ListFilter::default(), 0, &mut stop_after_first)
        .await
        .unwrap();
    assert_eq!(seen, 1);
}
