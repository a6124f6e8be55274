//! Port traits consumed by the orchestration graph.
//!
//! The graph never talks to an LLM or a vector index directly. It goes
//! through these seams so the orchestration logic works identically
//! regardless of which backend sits behind them.

use crate::document::Document;
use crate::error::{Result, TravlogError};
use async_trait::async_trait;

/// A binary yes/no verdict produced by a grading call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Yes,
    No,
}

impl Judgment {
    pub fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }

    /// Parses a grader response defensively.
    ///
    /// Backends deliver the judgment either as a bare `yes`/`no` token or as
    /// a string containing serialized JSON with a `score` field. Anything
    /// else is a hard `MalformedJudgment` error: coercing it to a default
    /// would hide a real backend contract violation.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        if let Some(judgment) = Self::from_token(trimmed) {
            return Ok(judgment);
        }

        // Structured form: {"score": "yes"} possibly surrounded by prose.
        if let Some(json) = extract_json_object(trimmed) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
                if let Some(score) = value.get("score").and_then(|s| s.as_str()) {
                    if let Some(judgment) = Self::from_token(score.trim()) {
                        return Ok(judgment);
                    }
                }
            }
        }

        Err(TravlogError::malformed_judgment(raw))
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Returns the first top-level `{...}` slice of `raw`, if any.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Grading, generation and query-rewrite capabilities backed by an LLM.
///
/// Graders return a [`Judgment`]; generators and the rewriter return free
/// text. All history arguments are pre-rendered `Role: content` transcripts
/// (see [`crate::graph::format_chat_history`]).
#[async_trait]
pub trait InferencePort: Send + Sync {
    /// First intent judgment: can chat history alone suffice for the question?
    async fn chat_vs_docs(&self, question: &str, history: &str) -> Result<Judgment>;

    /// Second intent judgment: does a chat-anchored question also need documents?
    async fn chat_type(&self, question: &str, history: &str) -> Result<Judgment>;

    /// Relevance of a single retrieved document to the question.
    async fn grade_document(&self, question: &str, document: &str) -> Result<Judgment>;

    /// Is the generation supported by the documents or conversation history?
    async fn grade_hallucination(
        &self,
        documents: &str,
        generation: &str,
        history: &str,
    ) -> Result<Judgment>;

    /// Does the generation actually address the question?
    async fn grade_answer(&self, question: &str, generation: &str) -> Result<Judgment>;

    /// RAG answer generation over the filtered document context.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// Chat-only answer generation from history alone.
    async fn generate_from_history(&self, question: &str, history: &str) -> Result<String>;

    /// Rewrites a context-dependent follow-up into a self-contained question.
    ///
    /// The hints are metadata values matched against the question, or the
    /// literal sentinel "정보없음" when no match was found; the sentinel is
    /// part of the prompt contract and must be passed through verbatim.
    async fn rewrite_question(
        &self,
        question: &str,
        card_type: &str,
        product_name: &str,
        history: &str,
    ) -> Result<String>;
}

/// Ranked document retrieval.
///
/// The returned sequence is already ordered by the retriever's internal
/// fusion of lexical and semantic scores; the graph treats it as opaque
/// ranked input and never re-ranks it.
#[async_trait]
pub trait RetrieverPort: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_tokens() {
        assert_eq!(Judgment::parse("yes").unwrap(), Judgment::Yes);
        assert_eq!(Judgment::parse(" No \n").unwrap(), Judgment::No);
        assert_eq!(Judgment::parse("YES").unwrap(), Judgment::Yes);
    }

    #[test]
    fn parses_structured_score() {
        assert_eq!(
            Judgment::parse(r#"{"score": "yes"}"#).unwrap(),
            Judgment::Yes
        );
        assert_eq!(Judgment::parse(r#"{"score":"no"}"#).unwrap(), Judgment::No);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Here is my assessment: {\"score\": \"no\"} as requested.";
        assert_eq!(Judgment::parse(raw).unwrap(), Judgment::No);
    }

    #[test]
    fn rejects_malformed_responses() {
        for raw in ["maybe", "", "{\"verdict\": \"yes\"}", "{\"score\": 1}"] {
            let err = Judgment::parse(raw).unwrap_err();
            assert!(err.is_malformed_judgment(), "expected rejection of {raw:?}");
        }
    }
}
