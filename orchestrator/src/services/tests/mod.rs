//! Service-specific tests
//!
//! Each service has its own test file. HTTP behaviour is exercised against a
//! local wiremock server, file-backed services against temporary directories.

#[cfg(test)]
mod document_store;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::Value;
    use shared::{CorrelationId, EntityId, EntityRecord, StoreSettings};

    use crate::types::{ApiRoute, Authorization, DispatchRequest, HttpMethod, RequestTemplate};

    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Record created `minutes_ago` minutes before `base_time`
    pub fn record(id: &str, minutes_ago: i64) -> EntityRecord {
        EntityRecord::new(EntityId::new(id), base_time() - Duration::minutes(minutes_ago))
    }

    pub fn store_settings(dir: &std::path::Path) -> StoreSettings {
        StoreSettings {
            path: dir.to_path_buf(),
            collection: "qsr_customers".to_string(),
        }
    }

    pub fn request(url: String, method: HttpMethod, template: RequestTemplate, auth: Authorization, payload: Value) -> DispatchRequest {
        DispatchRequest {
            correlation_id: CorrelationId::new(),
            target_entity_id: EntityId::new("u-1"),
            template,
            route: ApiRoute { method, url, auth },
            payload,
        }
    }
}
