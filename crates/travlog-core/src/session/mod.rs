//! Session domain module.
//!
//! This module contains the session domain model, conversation message
//! types, and the session lifecycle manager consumed by the turn boundary.
//!
//! # Module Structure
//!
//! - `message`: Conversation message types (`MessageRole`, `ChatMessage`)
//! - `model`: Core session domain model (`SessionState`)
//! - `manager`: Session lifecycle management (`SessionManager`, `SessionHandle`)

mod manager;
mod message;
mod model;

// Re-export public API
pub use manager::{SessionHandle, SessionManager};
pub use message::{ChatMessage, MessageRole};
pub use model::{DEFAULT_RECURSION_LIMIT, SESSION_GREETING, SessionState};
