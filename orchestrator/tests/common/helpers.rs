//! Test helpers and builder patterns for orchestrator tests
//!
//! This module provides convenient helper functions and builder patterns
//! to reduce test boilerplate and improve maintainability.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ::orchestrator::traits::MockRunLogSink;
use ::orchestrator::*;
use serde_json::json;
use shared::{Context, EntityId, ProcessId};

use super::fixtures::TestFixtures;

/// In-process transport that answers by template and records every call
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    failing: Mutex<HashSet<EntityId>>,
    calls: Mutex<Vec<DispatchRequest>>,
    registrations: AtomicUsize,
    registration_status: Mutex<Option<u16>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls for these entities fail with a refused connection
    pub fn failing_for(self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.inner.failing.lock().unwrap().extend(ids);
        self
    }

    /// Answer every registration with this status and an error body
    pub fn rejecting_registrations(self, status: u16) -> Self {
        *self.inner.registration_status.lock().unwrap() = Some(status);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, template: RequestTemplate) -> usize {
        self.calls().iter().filter(|r| r.template == template).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &DispatchRequest) -> Result<TransportResponse, TransportError> {
        self.inner.calls.lock().unwrap().push(request.clone());

        let delay = *self.inner.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.inner.failing.lock().unwrap().contains(&request.target_entity_id) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let response = match request.template {
            RequestTemplate::Transaction => TransportResponse { status: 200, body: "Transaction accepted".to_string() },
            RequestTemplate::ProfileUpdate => TransportResponse {
                status: 200,
                body: json!({ "user_profile": { "is_anomalous": true } }).to_string(),
            },
            RequestTemplate::CustomerCreate => {
                let rejected = *self.inner.registration_status.lock().unwrap();
                match rejected {
                    Some(status) => TransportResponse { status, body: "duplicate customer".to_string() },
                    None => {
                        let n = self.inner.registrations.fetch_add(1, Ordering::SeqCst);
                        TransportResponse {
                            status: 200,
                            body: json!({
                                "user": { "id": format!("core-{n}"), "email": request.payload["user"]["email"] }
                            })
                            .to_string(),
                        }
                    }
                }
            }
        };
        Ok(response)
    }
}

/// Builder for orchestrators wired to test doubles
pub struct OrchestratorBuilder {
    with_core: bool,
    max_in_flight: Option<usize>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self { with_core: true, max_in_flight: None }
    }

    pub fn without_core(mut self) -> Self {
        self.with_core = false;
        self
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Orchestrator whose run log must never be written
    pub fn build<S: EntityStore + 'static>(self, store: S, transport: FakeTransport) -> BurstOrchestrator<S, FakeTransport, MockRunLogSink> {
        let mut run_log = MockRunLogSink::new();
        run_log.expect_persist().never();
        self.build_with_log(store, transport, run_log)
    }

    pub fn build_with_log<S: EntityStore + 'static, L: RunLogSink + 'static>(
        self,
        store: S,
        transport: FakeTransport,
        run_log: L,
    ) -> BurstOrchestrator<S, FakeTransport, L> {
        let engine = DispatchEngine::new(
            transport,
            DispatchSettings { request_timeout: Duration::from_secs(5), max_in_flight: self.max_in_flight },
            ProcessId::Orchestrator(Context::Qsr),
        );
        BurstOrchestrator::new(&TestFixtures::config(self.with_core), store, engine, run_log)
    }
}
