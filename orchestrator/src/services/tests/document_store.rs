//! Tests for the file-backed document store

use chrono::Duration;
use shared::{Context, EntityId, ProcessId};
use tempfile::TempDir;

use super::common::{base_time, record, store_settings};
use crate::services::document_store::JsonDocumentStore;
use crate::traits::EntityStore;
use crate::types::EntityUpdate;

async fn open_store(dir: &TempDir) -> JsonDocumentStore {
    JsonDocumentStore::open(&store_settings(dir.path()), ProcessId::Orchestrator(Context::Qsr))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_missing_collection_scans_empty() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    assert!(store.scan_recent_first().await.unwrap().is_empty());
    assert_eq!(store.collection(), "qsr_customers");
    assert!(!store.file_path().exists());
}

#[tokio::test]
async fn test_insert_then_scan_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let inserted = store
        .insert_many(vec![record("old", 60), record("new", 1), record("mid", 30)])
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let ids: Vec<_> = store
        .scan_recent_first()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.entity_id.to_string())
        .collect();
    assert_eq!(ids, ["new", "mid", "old"]);

    // Re-inserting known ids is a no-op
    assert_eq!(store.insert_many(vec![record("new", 0)]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_updates_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.insert_many(vec![record("a", 5), record("b", 4)]).await.unwrap();

    let at = base_time() + Duration::hours(1);
    let matched = store
        .apply_updates(vec![
            EntityUpdate { entity_id: EntityId::new("a"), last_activity_timestamp: at, flag: true },
            EntityUpdate { entity_id: EntityId::new("ghost"), last_activity_timestamp: at, flag: false },
        ])
        .await
        .unwrap();
    assert_eq!(matched, 1);

    let reopened = open_store(&dir).await;
    let records = reopened.scan_recent_first().await.unwrap();
    let a = records.iter().find(|r| r.entity_id.as_str() == "a").unwrap();
    assert_eq!(a.last_activity_timestamp, Some(at));
    assert!(a.is_flagged);
    let b = records.iter().find(|r| r.entity_id.as_str() == "b").unwrap();
    assert!(!b.is_flagged);

    // Document layout uses the stored field names
    let raw = std::fs::read_to_string(reopened.file_path()).unwrap();
    assert!(raw.contains("\"user_id\""));
    assert!(raw.contains("\"lasttxn_timestamp\""));
    assert!(raw.contains("\"is_anomalous\""));
    // Only the collection and its lock file remain; no temporary files
    let mut names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["qsr_customers.json", "qsr_customers.json.lock"]);
}

#[tokio::test]
async fn test_corrupt_collection_is_a_store_error() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    std::fs::write(store.file_path(), "{ not json").unwrap();

    let error = store.scan_recent_first().await.unwrap_err();
    assert!(error.to_string().contains("qsr_customers"));
}

/// Two handles on one directory stand in for two processes sharing a collection
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_handles_keep_every_batch() {
    let dir = TempDir::new().unwrap();
    let first = open_store(&dir).await;
    let second = open_store(&dir).await;

    for round in 0..10 {
        let batch = |handle: &str| {
            (0..50)
                .map(|i| record(&format!("{handle}-{round}-{i}"), i))
                .collect::<Vec<_>>()
        };
        let (a, b) = tokio::join!(first.insert_many(batch("a")), second.insert_many(batch("b")));
        assert_eq!(a.unwrap(), 50);
        assert_eq!(b.unwrap(), 50);
        assert_eq!(first.scan_recent_first().await.unwrap().len(), (round + 1) * 100);
    }

    // Disjoint reconciliation batches from both handles both land
    let at = base_time() + Duration::minutes(5);
    let updates = |handle: &str| {
        (0..50)
            .map(|i| EntityUpdate {
                entity_id: EntityId::new(format!("{handle}-0-{i}")),
                last_activity_timestamp: at,
                flag: handle == "b",
            })
            .collect::<Vec<_>>()
    };
    let (a, b) = tokio::join!(first.apply_updates(updates("a")), second.apply_updates(updates("b")));
    assert_eq!(a.unwrap(), 50);
    assert_eq!(b.unwrap(), 50);

    let records = second.scan_recent_first().await.unwrap();
    let touched = records.iter().filter(|r| r.last_activity_timestamp == Some(at)).count();
    let flagged = records.iter().filter(|r| r.is_flagged).count();
    assert_eq!(touched, 100);
    assert_eq!(flagged, 50);
}
