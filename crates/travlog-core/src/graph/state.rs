//! Conversation state threaded through every graph step.

use crate::document::Document;
use crate::session::ChatMessage;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Classification of what a turn needs to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Chat history alone suffices.
    ChatOnly,
    /// Both chat history and retrieved documents are needed.
    ChatAndDocs,
    /// Documents alone are needed.
    DocsOnly,
}

/// The mutable record passed through every graph step.
///
/// One in-flight turn owns this exclusively while the graph executes; there
/// is no concurrent mutation across steps. Every field that may legitimately
/// be absent on some path is an `Option`, validated at the node that needs
/// it rather than discovered missing at a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Current, possibly rewritten, query text.
    pub question: String,
    /// Most recent produced answer, if any node generated one yet.
    pub generation: Option<String>,
    /// Working set from the most recent retrieval/filter/rewrite cycle.
    /// Empty is a valid state and triggers the rewrite path.
    pub documents: Vec<Document>,
    /// Intent selected for this turn; exactly one is set per turn.
    pub intent: Option<Intent>,
    /// Append-only conversation history carried forward from the session.
    pub history: Vec<ChatMessage>,
}

impl ConversationState {
    /// Creates the initial state for one turn, carrying the session history.
    pub fn new(question: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            question: question.into(),
            generation: None,
            documents: Vec::new(),
            intent: None,
            history,
        }
    }
}

/// Renders a conversation history as `Role: content` lines for prompts.
pub fn format_chat_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role.label(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_chat_history() {
        let messages = vec![
            ChatMessage::assistant("무엇을 도와드릴까요?"),
            ChatMessage::user("안녕"),
        ];

        assert_eq!(
            format_chat_history(&messages),
            "Assistant: 무엇을 도와드릴까요?\nUser: 안녕"
        );
    }

    #[test]
    fn test_format_empty_history() {
        assert_eq!(format_chat_history(&[]), "");
    }

    #[test]
    fn test_initial_state_has_no_intent() {
        let state = ConversationState::new("연회비?", Vec::new());

        assert!(state.intent.is_none());
        assert!(state.generation.is_none());
        assert!(state.documents.is_empty());
    }
}
