//! Orchestrator library for synthetic loyalty traffic
//!
//! Samples previously registered customers, sends concurrent bursts of
//! transaction and profile traffic for them, and writes the results back to
//! the customer store. Also registers new synthetic customers.

pub mod core;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use dispatch::{DispatchEngine, DispatchSettings};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::BurstOrchestrator;
pub use traits::{EntityStore, RunLogSink, Transport};
pub use types::*;
