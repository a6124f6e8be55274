//! Domain layer of the Travlog conversational RAG assistant.
//!
//! Holds the conversation orchestration graph, the port traits it consumes,
//! the session domain, and the shared error type. Everything performing real
//! I/O lives behind the ports in the surrounding crates.

pub mod document;
pub mod error;
pub mod graph;
pub mod ports;
pub mod session;

// Re-export common error type
pub use error::{Result, TravlogError};
