//! Shared error types for the traffic generation system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown context: {input} (expected retail, qsr or fuel)")]
    InvalidContext { input: String },

    #[error("Essential setting {key} is not set for context {context}")]
    MissingSetting { key: String, context: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },

    #[error("Logging setup failed: {message}")]
    LoggingError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
