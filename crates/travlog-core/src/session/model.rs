//! Session domain model.

use super::message::ChatMessage;
use crate::graph::GraphConfig;
use serde::{Deserialize, Serialize};

/// Default per-turn step bound for the orchestration graph.
pub const DEFAULT_RECURSION_LIMIT: usize = 10;

/// Greeting seeded into every fresh session.
pub const SESSION_GREETING: &str = "무엇을 도와드릴까요?";

/// Per-conversation state owned by the session manager.
///
/// A session lives for the process lifetime (or until explicitly cleared)
/// and is mutated only by appending messages or by a reset on clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session identifier (UUID format).
    pub session_id: String,
    /// Append-only conversation history, chronological.
    pub messages: Vec<ChatMessage>,
    /// Maximum number of graph node transitions allowed in one turn.
    pub recursion_limit: usize,
    /// Set to abort an in-flight turn for this session.
    pub stop_flag: bool,
}

impl SessionState {
    /// Creates a fresh session seeded with the assistant greeting.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: vec![ChatMessage::assistant(SESSION_GREETING)],
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            stop_flag: false,
        }
    }

    /// Returns the graph execution config for this session.
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            thread_id: self.session_id.clone(),
            recursion_limit: self.recursion_limit,
        }
    }
}
