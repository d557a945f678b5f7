//! In-memory entity store
//!
//! Same contract as the document store, without persistence. Also hosts the
//! record-level update rules both stores share.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{EntityId, EntityRecord};
use tokio::sync::RwLock;

use crate::error::OrchestratorResult;
use crate::traits::EntityStore;
use crate::types::EntityUpdate;

pub struct InMemoryEntityStore {
    collection: String,
    records: RwLock<Vec<EntityRecord>>,
    batch_writes: AtomicUsize,
}

impl InMemoryEntityStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_records(collection, Vec::new())
    }

    pub fn with_records(collection: impl Into<String>, records: Vec<EntityRecord>) -> Self {
        Self {
            collection: collection.into(),
            records: RwLock::new(records),
            batch_writes: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the stored records, in insertion order
    pub async fn records(&self) -> Vec<EntityRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, entity_id: &EntityId) -> Option<EntityRecord> {
        self.records.read().await.iter().find(|r| &r.entity_id == entity_id).cloned()
    }

    /// Number of write batches applied so far (updates and inserts)
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    fn collection(&self) -> String {
        self.collection.clone()
    }

    async fn scan_recent_first(&self) -> OrchestratorResult<Vec<EntityRecord>> {
        let mut records = self.records.read().await.clone();
        sort_recent_first(&mut records);
        Ok(records)
    }

    async fn apply_updates(&self, updates: Vec<EntityUpdate>) -> OrchestratorResult<usize> {
        let mut records = self.records.write().await;
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(apply_to(&mut records, &updates))
    }

    async fn insert_many(&self, new_records: Vec<EntityRecord>) -> OrchestratorResult<usize> {
        let mut records = self.records.write().await;
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(insert_into(&mut records, new_records))
    }
}

/// Newest first; ties keep their stored order
pub(crate) fn sort_recent_first(records: &mut [EntityRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Apply updates by id. The flag is only ever set, never cleared.
///
/// Returns how many stored records matched an update.
pub(crate) fn apply_to(records: &mut [EntityRecord], updates: &[EntityUpdate]) -> usize {
    // Repeated ids collapse to the latest timestamp and any flag
    let mut by_id: HashMap<&EntityId, (DateTime<Utc>, bool)> = HashMap::with_capacity(updates.len());
    for update in updates {
        let merged = by_id
            .entry(&update.entity_id)
            .or_insert((update.last_activity_timestamp, update.flag));
        merged.0 = merged.0.max(update.last_activity_timestamp);
        merged.1 |= update.flag;
    }

    let mut matched = 0;
    for record in records.iter_mut() {
        if let Some((timestamp, flag)) = by_id.get(&record.entity_id) {
            record.last_activity_timestamp = Some(*timestamp);
            record.is_flagged |= *flag;
            matched += 1;
        }
    }
    matched
}

/// Append records whose id is not stored yet. Returns how many were added.
pub(crate) fn insert_into(records: &mut Vec<EntityRecord>, new_records: Vec<EntityRecord>) -> usize {
    let mut known: HashSet<EntityId> = records.iter().map(|r| r.entity_id.clone()).collect();
    let before = records.len();
    for record in new_records {
        if known.insert(record.entity_id.clone()) {
            records.push(record);
        }
    }
    records.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: &str, minutes_ago: i64) -> EntityRecord {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        EntityRecord::new(EntityId::new(id), now - Duration::minutes(minutes_ago))
    }

    fn update(id: &str, flag: bool) -> EntityUpdate {
        EntityUpdate {
            entity_id: EntityId::new(id),
            last_activity_timestamp: Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap(),
            flag,
        }
    }

    #[tokio::test]
    async fn test_scan_orders_newest_first() {
        let store = InMemoryEntityStore::with_records(
            "qsr_customers",
            vec![record("old", 30), record("newest", 1), record("middle", 10)],
        );

        let ids: Vec<_> = store
            .scan_recent_first()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.entity_id.to_string())
            .collect();
        assert_eq!(ids, ["newest", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_updates_ignore_unknown_ids() {
        let store = InMemoryEntityStore::with_records("c", vec![record("a", 1), record("b", 2)]);

        let matched = store.apply_updates(vec![update("a", false), update("ghost", true)]).await.unwrap();
        assert_eq!(matched, 1);
        assert_eq!(store.batch_writes(), 1);

        let a = store.get(&EntityId::new("a")).await.unwrap();
        assert!(a.last_activity_timestamp.is_some());
        assert!(store.get(&EntityId::new("b")).await.unwrap().last_activity_timestamp.is_none());
        assert_eq!(store.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_flag_is_never_cleared() {
        let store = InMemoryEntityStore::with_records("c", vec![record("a", 1)]);

        store.apply_updates(vec![update("a", true)]).await.unwrap();
        store.apply_updates(vec![update("a", false)]).await.unwrap();

        assert!(store.get(&EntityId::new("a")).await.unwrap().is_flagged);
    }

    #[tokio::test]
    async fn test_insert_skips_existing_ids() {
        let store = InMemoryEntityStore::with_records("c", vec![record("a", 1)]);

        let inserted = store
            .insert_many(vec![record("a", 0), record("b", 0), record("b", 0)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.records().await.len(), 2);
    }
}
