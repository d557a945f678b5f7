//! Shared helpers for scheduler integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use orchestrator::{DispatchRequest, Transport, TransportError, TransportResponse};
use scheduler::{Clock, JobTask, Scheduler, SchedulerError, SchedulerResult, TokioClock};
use shared::{Context, ContextConfig, CoreApi, EntityId, EntityRecord, StoreSettings, TransactionApi};
use tokio::task::JoinHandle;

/// Saturday 2024-06-01 09:00 UTC
pub fn nine_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn paused_scheduler() -> Scheduler<TokioClock> {
    Scheduler::new(TokioClock::starting_at(nine_am()))
}

/// Run the scheduler on its own task, handing it back once it stops
pub fn spawn<C: Clock>(mut scheduler: Scheduler<C>) -> JoinHandle<Scheduler<C>> {
    tokio::spawn(async move {
        scheduler.run().await.unwrap();
        scheduler
    })
}

/// Task that takes `duration` per run and fails or panics on chosen runs (0-based)
#[derive(Default)]
pub struct ScriptedTask {
    runs: AtomicUsize,
    duration: Duration,
    fail_on: HashSet<usize>,
    panic_on: HashSet<usize>,
}

impl ScriptedTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn taking(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn failing_on(mut self, run: usize) -> Self {
        self.fail_on.insert(run);
        self
    }

    pub fn panicking_on(mut self, run: usize) -> Self {
        self.panic_on.insert(run);
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl JobTask for ScriptedTask {
    fn describe(&self) -> String {
        "scripted task".to_string()
    }

    async fn run(&self) -> SchedulerResult<String> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }
        if self.panic_on.contains(&run) {
            panic!("run {run} blew up");
        }
        if self.fail_on.contains(&run) {
            return Err(SchedulerError::ScriptFailed {
                command: "scripted".to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("run {run} failed"),
            });
        }
        Ok(format!("run {run} ok"))
    }
}

/// Transport that answers every call after a delay and tracks calls in flight
#[derive(Clone, Default)]
pub struct SlowTransport {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl SlowTransport {
    pub fn new(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: &DispatchRequest) -> Result<TransportResponse, TransportError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(TransportResponse { status: 200, body: "Transaction accepted".to_string() })
    }
}

pub fn config() -> ContextConfig {
    ContextConfig {
        context: Context::Qsr,
        transactions: TransactionApi {
            endpoint: "http://pos.invalid/api/2.0/send_transaction".parse().unwrap(),
            auth_token: "dG9rZW4=".to_string(),
            store_id: "store-1".to_string(),
            client_id: "client-1".to_string(),
        },
        core: Some(CoreApi {
            host: "http://core.invalid".parse().unwrap(),
            username: "app-user".to_string(),
            password: "secret".to_string(),
        }),
        store: StoreSettings {
            path: "./data".into(),
            collection: "qsr_customers".to_string(),
        },
    }
}

pub fn records(n: usize) -> Vec<EntityRecord> {
    (0..n)
        .map(|i| EntityRecord::new(EntityId::new(format!("user-{i:04}")), nine_am() - chrono::Duration::minutes(i as i64)))
        .collect()
}
