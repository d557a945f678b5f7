//! Service implementations
//!
//! This module contains real implementations of all service traits.
//! These are the production implementations that handle actual I/O operations.

pub mod document_store;
pub mod http_transport;
pub mod memory_store;
pub mod run_log;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use document_store::JsonDocumentStore;
pub use http_transport::RealTransport;
pub use memory_store::InMemoryEntityStore;
pub use run_log::FileRunLogSink;
