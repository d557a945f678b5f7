//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::SharedError;

/// Business domain a process runs against.
///
/// Selects the credentials, the store collection, and the payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Retail,
    Qsr,
    Fuel,
}

impl Context {
    pub const ALL: [Context; 3] = [Context::Retail, Context::Qsr, Context::Fuel];

    /// Prefix used for context-scoped environment settings (e.g. `QSR_`)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Context::Retail => "RETAIL",
            Context::Qsr => "QSR",
            Context::Fuel => "FUEL",
        }
    }

    /// Transaction type tag sent with every transaction payload
    pub fn transaction_type(&self) -> &'static str {
        match self {
            Context::Retail => "RETAIL_SALE",
            Context::Qsr => "QSR_SALE",
            Context::Fuel => "FUEL_SALE",
        }
    }

    /// Sales channels a synthetic transaction may be tagged with
    pub fn channels(&self) -> &'static [&'static str] {
        match self {
            Context::Retail => &["IN-STORE", "POS", "MOBILE"],
            Context::Qsr | Context::Fuel => &["IN-STORE", "MOBILE"],
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Retail => write!(f, "retail"),
            Context::Qsr => write!(f, "qsr"),
            Context::Fuel => write!(f, "fuel"),
        }
    }
}

impl FromStr for Context {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retail" => Ok(Context::Retail),
            "qsr" => Ok(Context::Qsr),
            "fuel" => Ok(Context::Fuel),
            _ => Err(SharedError::InvalidContext { input: s.to_string() }),
        }
    }
}

/// Identifier assigned by the remote platform to a registered customer
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Locally generated token matching a response to the request that caused it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, SharedError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SharedError::InvalidUuid { input: s.to_string() })
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One synthetic customer previously registered with the remote platform.
///
/// Field names on the wire follow the stored document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "user_id")]
    pub entity_id: EntityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Insertion time; default ordering key for sampling
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "lasttxn_timestamp", default, skip_serializing_if = "Option::is_none")]
    pub last_activity_timestamp: Option<DateTime<Utc>>,

    #[serde(rename = "is_anomalous", default)]
    pub is_flagged: bool,
}

impl EntityRecord {
    pub fn new(entity_id: EntityId, created_at: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            email: None,
            created_at,
            last_activity_timestamp: None,
            is_flagged: false,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Process identifier attached to every log line.
///
/// Passed explicitly to the components that log; there is no global instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// One-shot burst / registration command
    Orchestrator(Context),
    /// Long-running scheduler process
    Scheduler,
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator(context) => write!(f, "orchestrator_{context}"),
            ProcessId::Scheduler => write!(f, "scheduler"),
        }
    }
}
