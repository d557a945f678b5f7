//! Shared types for the synthetic loyalty traffic system
//!
//! Contains the domain types, configuration loading and logging setup used by
//! both the one-shot orchestrator commands and the long-running scheduler.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::{ContextConfig, CoreApi, RuntimeSettings, StoreSettings, TransactionApi};
pub use errors::*;
pub use types::*;
