//! Context-scoped configuration
//!
//! Settings come from the environment (optionally seeded from a `.env` file),
//! prefixed by the context they belong to, e.g. `QSR_CLOUDPOS_ENDPOINT`.
//! Loading goes through a key lookup closure so tests can supply settings
//! without touching the process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::{SharedError, SharedResult};
use crate::types::Context;

const DEFAULT_STORE_PATH: &str = "./data";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transaction submission endpoint and the identifiers embedded in payloads
#[derive(Clone)]
pub struct TransactionApi {
    pub endpoint: Url,
    /// Pre-encoded value sent as `Authorization: Basic <token>`
    pub auth_token: String,
    pub store_id: String,
    pub client_id: String,
}

impl fmt::Debug for TransactionApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionApi")
            .field("endpoint", &self.endpoint.as_str())
            .field("auth_token", &"<redacted>")
            .field("store_id", &self.store_id)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Customer (core) API used for registration and profile updates
#[derive(Clone)]
pub struct CoreApi {
    pub host: Url,
    pub username: String,
    pub password: String,
}

impl CoreApi {
    /// `POST` target for new customers
    pub fn users_url(&self) -> String {
        format!("{}/priv/v1/apps/{}/users", self.base(), self.username)
    }

    /// `PUT` target for one customer's profile model
    pub fn user_profile_url(&self, user_id: &str) -> String {
        format!("{}/{}/models/user_profile", self.users_url(), user_id)
    }

    fn base(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }
}

impl fmt::Debug for CoreApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreApi")
            .field("host", &self.host.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the document collection for a context lives
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub path: PathBuf,
    pub collection: String,
}

/// Everything a single context needs to run bursts and registrations
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub context: Context,
    pub transactions: TransactionApi,
    pub core: Option<CoreApi>,
    pub store: StoreSettings,
}

impl ContextConfig {
    /// Load `.env` (if any) and read the context's settings from the environment
    pub fn from_env(context: Context) -> SharedResult<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(context, |key| std::env::var(key).ok())
    }

    /// Read the context's settings through `lookup`
    pub fn from_lookup<F>(context: Context, lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Scoped { context, lookup: &lookup };

        let transactions = TransactionApi {
            endpoint: settings.url("CLOUDPOS_ENDPOINT")?,
            auth_token: settings.required("CLOUDPOS_AUTH_TOKEN")?,
            store_id: settings.required("STORE_ID")?,
            client_id: settings.required("CLIENT_ID")?,
        };

        // Core credentials are all-or-nothing
        let core_keys = ["CORE_HOST", "CORE_USERNAME", "CORE_PASSWORD"];
        let present = core_keys.iter().filter(|key| settings.optional(key).is_some()).count();
        let core = if present == 0 {
            None
        } else {
            Some(CoreApi {
                host: settings.url("CORE_HOST")?,
                username: settings.required("CORE_USERNAME")?,
                password: settings.required("CORE_PASSWORD")?,
            })
        };

        let store = StoreSettings {
            path: settings
                .optional("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            collection: settings
                .optional("STORE_COLLECTION")
                .unwrap_or_else(|| format!("{context}_customers")),
        };

        Ok(Self { context, transactions, core, store })
    }

    /// Core API settings, failing when the context has none configured
    pub fn require_core(&self) -> SharedResult<&CoreApi> {
        self.core.as_ref().ok_or_else(|| SharedError::MissingSetting {
            key: format!("{}_CORE_HOST", self.context.env_prefix()),
            context: self.context.to_string(),
        })
    }
}

/// Process-wide tunables that are not tied to a context
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub request_timeout: Duration,
    /// Upper bound on simultaneous outbound calls; `None` issues a whole batch at once
    pub max_in_flight: Option<usize>,
    pub log_dir: PathBuf,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_in_flight: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl RuntimeSettings {
    pub fn from_env() -> SharedResult<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout = match read("TRAFFIC_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(invalid("TRAFFIC_REQUEST_TIMEOUT_SECS", &raw)),
            },
            None => defaults.request_timeout,
        };

        let max_in_flight = match read("TRAFFIC_MAX_IN_FLIGHT") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => return Err(invalid("TRAFFIC_MAX_IN_FLIGHT", &raw)),
            },
            None => defaults.max_in_flight,
        };

        let log_dir = read("TRAFFIC_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir);

        Ok(Self { request_timeout, max_in_flight, log_dir })
    }
}

/// Lookup helper that applies the context prefix to every key
struct Scoped<'a, F> {
    context: Context,
    lookup: &'a F,
}

impl<F> Scoped<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.context.env_prefix(), suffix)
    }

    fn optional(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&self.key(suffix))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, suffix: &str) -> SharedResult<String> {
        self.optional(suffix).ok_or_else(|| SharedError::MissingSetting {
            key: self.key(suffix),
            context: self.context.to_string(),
        })
    }

    fn url(&self, suffix: &str) -> SharedResult<Url> {
        let raw = self.required(suffix)?;
        Url::parse(&raw).map_err(|_| invalid(&self.key(suffix), &raw))
    }
}

fn invalid(field: &str, value: &str) -> SharedError {
    SharedError::InvalidConfig { field: field.to_string(), value: value.to_string() }
}
