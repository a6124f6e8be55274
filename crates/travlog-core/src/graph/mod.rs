//! Conversation orchestration graph.
//!
//! This module is the core of the system: the directed graph of decision
//! nodes that classifies intent, routes between chat-memory-only and
//! document-retrieval paths, grades retrieved documents and generations,
//! and loops back to query rewriting when quality checks fail.
//!
//! # Module Structure
//!
//! - `state`: `ConversationState`, `Intent`, transcript rendering
//! - `nodes`: the node operations and pure routing functions
//! - `machine`: the explicit state machine, step bound, streaming entry point

mod machine;
mod nodes;
mod state;

// Re-export public API
pub use machine::{Graph, GraphConfig, NodeKind, TurnDelta, TurnEvent};
pub use nodes::{GenerationVerdict, NO_HINT, decide_path, decide_to_generate};
pub use state::{ConversationState, Intent, format_chat_history};
