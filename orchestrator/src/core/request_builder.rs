//! Request construction for each logical template
//!
//! Building a request never performs I/O. Every request gets a fresh
//! correlation id, which for transactions doubles as the payload's
//! `request_id`.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use shared::{Context, ContextConfig, CoreApi, CorrelationId, EntityId, TransactionApi};
use uuid::Uuid;

use crate::core::customers::SyntheticCustomer;
use crate::error::OrchestratorResult;
use crate::types::{ApiRoute, Authorization, DispatchRequest, HttpMethod, RequestTemplate};

const PAYMENT_TYPES: &[&str] = &["Credit", "Cash", "Gift Card"];
const MIN_AMOUNT: u32 = 10;
const MAX_AMOUNT: u32 = 100;

/// Transaction body for one entity.
///
/// Pure apart from the random draws taken from `rng`.
pub fn transaction_payload<R: Rng + ?Sized>(
    context: Context,
    api: &TransactionApi,
    entity_id: &EntityId,
    correlation_id: CorrelationId,
    at: DateTime<Utc>,
    rng: &mut R,
) -> Value {
    let time = at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let amount = f64::from(rng.gen_range(MIN_AMOUNT..=MAX_AMOUNT));
    let channel = context.channels().choose(rng).copied().unwrap_or("IN-STORE");
    let payment_type = PAYMENT_TYPES.choose(rng).copied().unwrap_or("Credit");

    let mut body = json!({
        "transaction_type": context.transaction_type(),
        "is_closed": true,
        "is_voided": false,
        "channel": channel,
        "pos_employee_id": "234234",
        "transaction_id": Uuid::new_v4().to_string(),
        "guest_count": 1,
        "subtotal": amount,
        "tax_total": 0.0,
        "open_time": time,
        "modified_time": time,
        "items": [{
            "line_id": "1",
            "item_id": "008884303989M",
            "quantity": 1,
            "unit_price": amount,
            "subtotal": amount,
            "tax_included": 0
        }],
        "payments": [{
            "payment_id": Uuid::new_v4().to_string(),
            "amount": amount,
            "type": payment_type,
            "payment_time": time,
            "user_id": entity_id.as_str(),
            "user_id_type": "External_ID"
        }],
        "discounts": []
    });

    if context == Context::Retail {
        body["custom_data"] = json!({ "brand": "Koalla Retail" });
    }

    json!({
        "store_id": api.store_id,
        "client_id": api.client_id,
        "request_id": correlation_id.to_string(),
        "request_payload": body,
    })
}

/// Body marking a customer's profile as anomalous
pub fn profile_update_payload() -> Value {
    json!({ "user_profile": { "is_anomalous": true } })
}

/// Builds dispatch requests for one context's endpoints
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    context: Context,
    transactions: TransactionApi,
    core: Option<CoreApi>,
}

impl RequestBuilder {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            context: config.context,
            transactions: config.transactions.clone(),
            core: config.core.clone(),
        }
    }

    pub fn context(&self) -> Context {
        self.context
    }

    /// Fails unless core API credentials are configured
    pub fn require_core(&self) -> OrchestratorResult<&CoreApi> {
        self.core.as_ref().ok_or_else(|| {
            shared::SharedError::MissingSetting {
                key: format!("{}_CORE_HOST", self.context.env_prefix()),
                context: self.context.to_string(),
            }
            .into()
        })
    }

    pub fn transaction<R: Rng + ?Sized>(&self, entity_id: &EntityId, at: DateTime<Utc>, rng: &mut R) -> DispatchRequest {
        let correlation_id = CorrelationId::new();
        DispatchRequest {
            correlation_id,
            target_entity_id: entity_id.clone(),
            template: RequestTemplate::Transaction,
            route: ApiRoute {
                method: HttpMethod::Post,
                url: self.transactions.endpoint.to_string(),
                auth: Authorization::BasicToken(self.transactions.auth_token.clone()),
            },
            payload: transaction_payload(self.context, &self.transactions, entity_id, correlation_id, at, rng),
        }
    }

    pub fn profile_update(&self, entity_id: &EntityId) -> OrchestratorResult<DispatchRequest> {
        let core = self.require_core()?;
        Ok(DispatchRequest {
            correlation_id: CorrelationId::new(),
            target_entity_id: entity_id.clone(),
            template: RequestTemplate::ProfileUpdate,
            route: ApiRoute {
                method: HttpMethod::Put,
                url: core.user_profile_url(entity_id.as_str()),
                auth: core_auth(core),
            },
            payload: profile_update_payload(),
        })
    }

    /// Registration request; the target id is the customer's external id
    pub fn customer_create(&self, customer: &SyntheticCustomer) -> OrchestratorResult<DispatchRequest> {
        let core = self.require_core()?;
        Ok(DispatchRequest {
            correlation_id: CorrelationId::new(),
            target_entity_id: EntityId::new(customer.external_id.clone()),
            template: RequestTemplate::CustomerCreate,
            route: ApiRoute {
                method: HttpMethod::Post,
                url: core.users_url(),
                auth: core_auth(core),
            },
            payload: customer.to_payload(self.context),
        })
    }
}

fn core_auth(core: &CoreApi) -> Authorization {
    Authorization::Basic {
        username: core.username.clone(),
        password: core.password.clone(),
    }
}
