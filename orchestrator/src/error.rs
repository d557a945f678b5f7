//! Orchestrator-specific error types
//!
//! Per-call dispatch failures are not errors here: they are carried as
//! `DispatchOutcome::Failure` values. Only conditions that should stop a
//! burst surface as `OrchestratorError`.

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] SharedError),

    #[error("Entity store {operation} failed on {collection}: {message}")]
    StoreError {
        operation: String,
        collection: String,
        message: String,
    },

    #[error("Invalid sample policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("HTTP client setup failed: {message}")]
    HttpClientError { message: String },

    #[error("Run artifact write failed for {path}: {source}")]
    ArtifactError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn store(operation: &str, collection: &str, message: impl Into<String>) -> Self {
        Self::StoreError {
            operation: operation.to_string(),
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    pub fn policy(reason: impl Into<String>) -> Self {
        Self::InvalidPolicy { reason: reason.into() }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
