//! Orchestrator-specific data types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{Context, CorrelationId, EntityId};
use thiserror::Error;

use crate::error::{OrchestratorError, OrchestratorResult};

/// How many candidates a burst takes from the ordered candidate list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplePolicy {
    /// Exactly `k` entities (or all of them when fewer exist)
    FixedCount(usize),
    /// `max(1, floor(n * f))` entities
    Fraction(f64),
    /// A fraction drawn uniformly from `[min, max]` once per burst
    RandomFraction { min: f64, max: f64 },
}

impl SamplePolicy {
    pub fn validate(&self) -> OrchestratorResult<()> {
        let in_range = |f: f64| f.is_finite() && f > 0.0 && f <= 1.0;
        match *self {
            SamplePolicy::FixedCount(0) => Err(OrchestratorError::policy("fixed count must be at least 1")),
            SamplePolicy::FixedCount(_) => Ok(()),
            SamplePolicy::Fraction(f) if !in_range(f) => {
                Err(OrchestratorError::policy(format!("fraction {f} is outside (0, 1]")))
            }
            SamplePolicy::Fraction(_) => Ok(()),
            SamplePolicy::RandomFraction { min, max } if !in_range(min) || !in_range(max) => Err(
                OrchestratorError::policy(format!("fraction range {min}..{max} is outside (0, 1]")),
            ),
            SamplePolicy::RandomFraction { min, max } if min > max => {
                Err(OrchestratorError::policy(format!("fraction range {min}..{max} is reversed")))
            }
            SamplePolicy::RandomFraction { .. } => Ok(()),
        }
    }
}

impl fmt::Display for SamplePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplePolicy::FixedCount(k) => write!(f, "count={k}"),
            SamplePolicy::Fraction(fraction) => write!(f, "fraction={fraction}"),
            SamplePolicy::RandomFraction { min, max } => write!(f, "random-fraction={min}..{max}"),
        }
    }
}

/// Logical request shape produced by the request builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTemplate {
    Transaction,
    ProfileUpdate,
    CustomerCreate,
}

impl RequestTemplate {
    /// What a successful response body must look like
    pub fn expectation(&self) -> ResponseExpectation {
        match self {
            RequestTemplate::Transaction => ResponseExpectation::Text,
            RequestTemplate::ProfileUpdate | RequestTemplate::CustomerCreate => ResponseExpectation::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseExpectation {
    /// Any body is accepted and kept verbatim
    Text,
    /// Body must parse as JSON, otherwise the call is a `MalformedBody` failure
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Post,
    Put,
}

/// Credentials attached to an outbound call
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Pre-encoded token sent as `Authorization: Basic <token>`
    BasicToken(String),
    /// Username/password encoded by the HTTP client
    Basic { username: String, password: String },
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::BasicToken(_) => write!(f, "BasicToken(<redacted>)"),
            Authorization::Basic { username, .. } => write!(f, "Basic({username}:<redacted>)"),
        }
    }
}

/// Where and how one request is sent
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRoute {
    pub method: HttpMethod,
    pub url: String,
    pub auth: Authorization,
}

/// One outbound call instance; consumed by exactly one network call
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub correlation_id: CorrelationId,
    pub target_entity_id: EntityId,
    pub template: RequestTemplate,
    pub route: ApiRoute,
    pub payload: Value,
}

/// Raw answer from the transport before classification
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Transport-level failure (no usable HTTP response)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS, TLS and similar
    Transport,
    /// Per-call deadline elapsed
    Timeout,
    /// Remote answered with a non-success status
    Status,
    /// Success status but the body could not be parsed as expected
    MalformedBody,
    /// The call itself panicked
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Status => "status",
            FailureKind::MalformedBody => "malformed_body",
            FailureKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success {
        status: u16,
        body: ResponseBody,
    },
    Failure {
        kind: FailureKind,
        status: Option<u16>,
        detail: String,
    },
}

/// Outcome of one dispatch request, linked back through its correlation id
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub correlation_id: CorrelationId,
    pub outcome: DispatchOutcome,
    pub elapsed: Duration,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Success { .. })
    }
}

/// Reconciliation write for one sampled entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub entity_id: EntityId,
    pub last_activity_timestamp: DateTime<Utc>,
    /// Set the anomaly flag; never clears it
    pub flag: bool,
}

/// Parameters of one burst
#[derive(Debug, Clone, PartialEq)]
pub struct BurstPlan {
    pub policy: SamplePolicy,
    pub transactions_per_entity: u32,
    pub flag_anomalous: bool,
    pub persist_log: bool,
}

impl BurstPlan {
    /// One transaction for a tenth of the customers
    pub fn randomize() -> Self {
        Self {
            policy: SamplePolicy::Fraction(0.1),
            transactions_per_entity: 1,
            flag_anomalous: false,
            persist_log: false,
        }
    }

    /// A rapid series of transactions for one percent of the customers, who get flagged
    pub fn anomaly(burst_amount: u32) -> Self {
        Self {
            policy: SamplePolicy::Fraction(0.01),
            transactions_per_entity: burst_amount,
            flag_anomalous: true,
            persist_log: false,
        }
    }

    /// First purchase for a share of freshly registered customers
    pub fn first_transactions() -> Self {
        Self {
            policy: SamplePolicy::Fraction(0.4),
            ..Self::randomize()
        }
    }

    pub fn with_policy(mut self, policy: SamplePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_persist_log(mut self, persist_log: bool) -> Self {
        self.persist_log = persist_log;
        self
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        self.policy.validate()?;
        if self.transactions_per_entity == 0 {
            return Err(OrchestratorError::policy("transactions per entity must be at least 1"));
        }
        Ok(())
    }
}

/// What one burst did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstSummary {
    pub context: Context,
    pub started_at: DateTime<Utc>,
    pub candidates_seen: usize,
    pub sampled_count: usize,
    pub dispatched_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub reconciled_count: usize,
    pub flagged: bool,
    pub artifact: Option<PathBuf>,
}

impl BurstSummary {
    pub fn empty(context: Context, started_at: DateTime<Utc>, candidates_seen: usize) -> Self {
        Self {
            context,
            started_at,
            candidates_seen,
            sampled_count: 0,
            dispatched_count: 0,
            success_count: 0,
            failure_count: 0,
            reconciled_count: 0,
            flagged: false,
            artifact: None,
        }
    }
}

impl fmt::Display for BurstSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} candidates, {} sampled, {} requests ({} ok / {} failed), {} reconciled",
            self.context,
            self.candidates_seen,
            self.sampled_count,
            self.dispatched_count,
            self.success_count,
            self.failure_count,
            self.reconciled_count
        )
    }
}

/// Parameters of one customer registration run
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationPlan {
    pub min_customers: u32,
    pub max_customers: u32,
    pub send_first_transactions: bool,
    pub persist_log: bool,
}

impl Default for RegistrationPlan {
    fn default() -> Self {
        Self {
            min_customers: 10,
            max_customers: 100,
            send_first_transactions: false,
            persist_log: false,
        }
    }
}

impl RegistrationPlan {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.min_customers == 0 || self.min_customers > self.max_customers {
            return Err(OrchestratorError::policy(format!(
                "customer range {}..={} is empty or starts at zero",
                self.min_customers, self.max_customers
            )));
        }
        Ok(())
    }
}

/// What one registration run did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationSummary {
    pub context: Context,
    pub requested: usize,
    pub registered: usize,
    pub failed: usize,
    pub inserted: usize,
    pub artifact: Option<PathBuf>,
    pub first_transactions: Option<BurstSummary>,
}

impl fmt::Display for RegistrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} requested, {} registered, {} failed, {} stored",
            self.context, self.requested, self.registered, self.failed, self.inserted
        )
    }
}

/// One line of a persisted run artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub correlation_id: CorrelationId,
    pub entity_id: EntityId,
    pub template: RequestTemplate,
    pub request_body: Value,
    /// HTTP status, or `"error"` when no response was received
    pub status: Value,
    pub response: Value,
}

impl RunLogEntry {
    pub fn new(request: &DispatchRequest, result: &DispatchResult) -> Self {
        let (status, response) = match &result.outcome {
            DispatchOutcome::Success { status, body } => (Value::from(*status), body_value(body)),
            DispatchOutcome::Failure { status: Some(status), detail, .. } => {
                (Value::from(*status), Value::String(detail.clone()))
            }
            DispatchOutcome::Failure { status: None, kind, detail } => {
                (Value::String("error".to_string()), Value::String(format!("{kind}: {detail}")))
            }
        };

        Self {
            correlation_id: request.correlation_id,
            entity_id: request.target_entity_id.clone(),
            template: request.template,
            request_body: request.payload.clone(),
            status,
            response,
        }
    }
}

fn body_value(body: &ResponseBody) -> Value {
    match body {
        ResponseBody::Json(value) => value.clone(),
        ResponseBody::Text(text) => Value::String(text.clone()),
    }
}
