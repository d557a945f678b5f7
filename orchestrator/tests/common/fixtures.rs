//! Test fixtures and data for orchestrator tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::{Context, ContextConfig, CoreApi, EntityId, EntityRecord, StoreSettings, TransactionApi};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const CONTEXT: Context = Context::Qsr;
    pub const COLLECTION: &'static str = "qsr_customers";

    /// Creation time of the newest stored customer
    pub fn newest() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Context settings pointing at hosts that are never contacted
    pub fn config(with_core: bool) -> ContextConfig {
        ContextConfig {
            context: Self::CONTEXT,
            transactions: TransactionApi {
                endpoint: "http://pos.invalid/api/2.0/send_transaction".parse().unwrap(),
                auth_token: "dG9rZW4=".to_string(),
                store_id: "store-1".to_string(),
                client_id: "client-1".to_string(),
            },
            core: with_core.then(|| CoreApi {
                host: "http://core.invalid".parse().unwrap(),
                username: "app-user".to_string(),
                password: "secret".to_string(),
            }),
            store: StoreSettings {
                path: "./data".into(),
                collection: Self::COLLECTION.to_string(),
            },
        }
    }

    pub fn entity_id(i: usize) -> EntityId {
        EntityId::new(format!("user-{i:04}"))
    }

    /// `n` customers; `user-0000` is the newest, one minute apart
    pub fn records(n: usize) -> Vec<EntityRecord> {
        (0..n)
            .map(|i| EntityRecord::new(Self::entity_id(i), Self::newest() - Duration::minutes(i as i64)))
            .collect()
    }

    /// Same customers as `records`, stored oldest first
    pub fn records_oldest_first(n: usize) -> Vec<EntityRecord> {
        let mut records = Self::records(n);
        records.reverse();
        records
    }
}
