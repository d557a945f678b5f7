//! Scheduler-specific error types

use orchestrator::OrchestratorError;
use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Config(#[from] SharedError),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("Invalid trigger: {reason}")]
    InvalidTrigger { reason: String },

    #[error("Job '{id}' is already scheduled")]
    DuplicateJob { id: String },

    #[error("Failed to start '{command}': {source}")]
    ScriptSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    ScriptFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Burst failed: {0}")]
    Burst(#[from] OrchestratorError),

    #[error("Job panicked: {message}")]
    JobPanicked { message: String },
}

impl SchedulerError {
    pub fn cron(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCron {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub fn trigger(reason: impl Into<String>) -> Self {
        Self::InvalidTrigger { reason: reason.into() }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
