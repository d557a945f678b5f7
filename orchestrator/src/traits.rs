//! Trait definitions with mockall annotations for testing
//!
//! These are the I/O seams of the burst pipeline. The orchestrator and the
//! dispatch engine are generic over them so tests can swap in mocks or
//! in-memory fakes without touching the network or the disk.

use std::path::PathBuf;

use shared::EntityRecord;

use crate::error::OrchestratorResult;
use crate::types::{DispatchRequest, EntityUpdate, RunLogEntry, TransportError, TransportResponse};

/// Entity store adapter over one document collection
#[mockall::automock]
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    /// Collection name, for logs and errors
    fn collection(&self) -> String;

    /// Every record in the collection, most recently created first
    async fn scan_recent_first(&self) -> OrchestratorResult<Vec<EntityRecord>>;

    /// Apply all updates as one batch; ids that match no record are ignored.
    ///
    /// # Returns
    /// Number of records that matched an update
    async fn apply_updates(&self, updates: Vec<EntityUpdate>) -> OrchestratorResult<usize>;

    /// Insert new records as one batch, skipping ids that already exist
    ///
    /// # Returns
    /// Number of records actually inserted
    async fn insert_many(&self, records: Vec<EntityRecord>) -> OrchestratorResult<usize>;
}

/// Network transport used by the dispatch engine for a single call
#[mockall::automock]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call described by `request` and return the raw response
    async fn send(&self, request: &DispatchRequest) -> Result<TransportResponse, TransportError>;
}

/// Sink for per-run request/response artifacts
#[mockall::automock]
#[async_trait::async_trait]
pub trait RunLogSink: Send + Sync {
    /// Persist one run's entries under a name derived from `kind` and the current time
    async fn persist(&self, kind: &str, entries: Vec<RunLogEntry>) -> OrchestratorResult<PathBuf>;
}
