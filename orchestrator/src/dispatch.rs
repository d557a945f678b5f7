//! Concurrent dispatch of a batch of requests
//!
//! Every request in a batch is issued concurrently (optionally capped by
//! `max_in_flight`) and produces exactly one `DispatchResult` carrying the
//! request's correlation id. A slow, failing or panicking call never affects
//! its siblings: each call runs under its own deadline and panic guard, and
//! its failure is recorded as a result value.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use shared::{process_debug, process_info, process_warn, ProcessId, RuntimeSettings};

use crate::traits::Transport;
use crate::types::{
    DispatchOutcome, DispatchRequest, DispatchResult, FailureKind, ResponseBody, ResponseExpectation,
    TransportError, TransportResponse,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// Deadline applied to each call independently
    pub request_timeout: Duration,
    /// Cap on simultaneous calls; `None` launches the whole batch at once
    pub max_in_flight: Option<usize>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

impl From<&RuntimeSettings> for DispatchSettings {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            max_in_flight: settings.max_in_flight,
        }
    }
}

pub struct DispatchEngine<T: Transport> {
    transport: T,
    settings: DispatchSettings,
    process_id: ProcessId,
}

impl<T: Transport> DispatchEngine<T> {
    pub fn new(transport: T, settings: DispatchSettings, process_id: ProcessId) -> Self {
        Self { transport, settings, process_id }
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Issue every request and wait for all of them to settle.
    ///
    /// Returns one result per request, in completion order.
    pub async fn dispatch(&self, requests: &[DispatchRequest]) -> Vec<DispatchResult> {
        if requests.is_empty() {
            return Vec::new();
        }

        let limit = self.settings.max_in_flight.unwrap_or(requests.len()).max(1);
        process_info!(
            self.process_id,
            "📤 Dispatching {} requests ({} in flight max, {:?} timeout)",
            requests.len(),
            limit.min(requests.len()),
            self.settings.request_timeout
        );

        let started = Instant::now();
        let calls: Vec<_> = requests.iter().map(|request| self.dispatch_one(request)).collect();
        let results: Vec<DispatchResult> = stream::iter(calls)
            .buffer_unordered(limit)
            .collect()
            .await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        process_info!(
            self.process_id,
            "📥 Batch settled in {:?}: {} succeeded, {} failed",
            started.elapsed(),
            succeeded,
            results.len() - succeeded
        );

        results
    }

    async fn dispatch_one(&self, request: &DispatchRequest) -> DispatchResult {
        let started = Instant::now();
        let call = tokio::time::timeout(self.settings.request_timeout, self.transport.send(request));

        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(Ok(response))) => classify(response, request.template.expectation()),
            Ok(Ok(Err(error))) => transport_failure(error),
            Ok(Err(_)) => DispatchOutcome::Failure {
                kind: FailureKind::Timeout,
                status: None,
                detail: format!("no response within {:?}", self.settings.request_timeout),
            },
            Err(panic) => DispatchOutcome::Failure {
                kind: FailureKind::Internal,
                status: None,
                detail: panic_message(panic.as_ref()),
            },
        };

        let elapsed = started.elapsed();
        match &outcome {
            DispatchOutcome::Success { status, .. } => {
                process_debug!(
                    self.process_id,
                    "{} {:?} for {} -> {} in {:?}",
                    request.correlation_id,
                    request.template,
                    request.target_entity_id,
                    status,
                    elapsed
                );
            }
            DispatchOutcome::Failure { kind, detail, .. } => {
                process_warn!(
                    self.process_id,
                    "⚠️ {} {:?} for {} failed ({}): {}",
                    request.correlation_id,
                    request.template,
                    request.target_entity_id,
                    kind,
                    detail
                );
            }
        }

        DispatchResult {
            correlation_id: request.correlation_id,
            outcome,
            elapsed,
        }
    }
}

/// Turn a raw response into an outcome according to the template's expectation
pub fn classify(response: TransportResponse, expectation: ResponseExpectation) -> DispatchOutcome {
    let TransportResponse { status, body } = response;

    if !(200..300).contains(&status) {
        return DispatchOutcome::Failure {
            kind: FailureKind::Status,
            status: Some(status),
            detail: body,
        };
    }

    match expectation {
        ResponseExpectation::Text => DispatchOutcome::Success {
            status,
            body: ResponseBody::Text(body),
        },
        ResponseExpectation::Json => match serde_json::from_str(&body) {
            Ok(value) => DispatchOutcome::Success {
                status,
                body: ResponseBody::Json(value),
            },
            Err(_) => DispatchOutcome::Failure {
                kind: FailureKind::MalformedBody,
                status: Some(status),
                detail: body,
            },
        },
    }
}

fn transport_failure(error: TransportError) -> DispatchOutcome {
    let kind = match error {
        TransportError::Timeout(_) => FailureKind::Timeout,
        TransportError::Connect(_) | TransportError::Other(_) => FailureKind::Transport,
    };
    DispatchOutcome::Failure {
        kind,
        status: None,
        detail: error.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("call panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("call panicked: {message}")
    } else {
        "call panicked".to_string()
    }
}
