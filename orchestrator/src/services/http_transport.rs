//! Real HTTP transport implementation
//!
//! One long-lived `reqwest::Client` is shared by every call of every batch so
//! connections are pooled across a burst.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::Transport;
use crate::types::{Authorization, DispatchRequest, HttpMethod, TransportError, TransportResponse};

pub struct RealTransport {
    client: Client,
}

impl RealTransport {
    /// Build a client whose own timeout matches the per-call deadline
    pub fn new(request_timeout: Duration) -> OrchestratorResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| OrchestratorError::HttpClientError { message: e.to_string() })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for RealTransport {
    async fn send(&self, request: &DispatchRequest) -> Result<TransportResponse, TransportError> {
        let route = &request.route;
        let builder = match route.method {
            HttpMethod::Post => self.client.post(&route.url),
            HttpMethod::Put => self.client.put(&route.url),
        };

        let builder = match &route.auth {
            Authorization::BasicToken(token) => builder.header(reqwest::header::AUTHORIZATION, format!("Basic {token}")),
            Authorization::Basic { username, password } => builder.basic_auth(username, Some(password)),
        };

        let response = builder.json(&request.payload).send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(format!("reading body of {status} response: {e}")))?;

        Ok(TransportResponse { status, body })
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
