//! Node operations of the orchestration graph.
//!
//! Each async node performs exactly one concern against a port and mutates
//! the [`ConversationState`] it was handed; the pure functions in between
//! ([`decide_path`], [`decide_to_generate`]) do the routing. History only
//! ever grows here; no node removes or reorders existing entries.
//!
//! Note on history phrasing: `transform_query` appends the *rewritten*
//! question and `retrieve` appends whatever question text it receives, so a
//! rewritten turn can appear in history twice with different phrasings.
//! Downstream prompts rely on seeing the rewritten form.

use super::machine::NodeKind;
use super::state::{ConversationState, Intent, format_chat_history};
use crate::document::Document;
use crate::error::{Result, TravlogError};
use crate::ports::{InferencePort, RetrieverPort};
use crate::session::ChatMessage;
use tracing::{debug, info};

/// Sentinel passed to the rewrite prompt when no metadata hint matches the
/// question. Part of the external prompt contract, not a null.
pub const NO_HINT: &str = "정보없음";

/// Classifies the turn's intent with two sequential judgments.
///
/// The second call depends on the first's outcome: when chat history cannot
/// suffice the intent is `DocsOnly` and the chat-type grader is skipped.
pub(crate) async fn classify_intent(
    state: &mut ConversationState,
    inference: &dyn InferencePort,
) -> Result<()> {
    info!("classifying intent");
    let history = format_chat_history(&state.history);

    let chat_vs_docs = inference.chat_vs_docs(&state.question, &history).await?;

    let intent = if chat_vs_docs.is_yes() {
        if inference
            .chat_type(&state.question, &history)
            .await?
            .is_yes()
        {
            Intent::ChatAndDocs
        } else {
            Intent::ChatOnly
        }
    } else {
        Intent::DocsOnly
    };

    info!(%intent, "intent classified");
    state.intent = Some(intent);
    Ok(())
}

/// Maps the classified intent to the next node.
///
/// Pure function of the intent alone. Reaching this without an intent is an
/// invariant violation of the classifier contract, not a user-facing error.
pub fn decide_path(intent: Option<Intent>) -> Result<NodeKind> {
    match intent {
        Some(Intent::ChatOnly) => Ok(NodeKind::GenerateFromHistory),
        Some(Intent::ChatAndDocs) => Ok(NodeKind::TransformQuery),
        Some(Intent::DocsOnly) => Ok(NodeKind::Retrieve),
        None => Err(TravlogError::internal(
            "path decision reached without a classified intent",
        )),
    }
}

/// Retrieves documents for the current question.
///
/// Appends the *current* question text as a user message, so follow-ups
/// recorded after rewriting reflect the rewritten form. The retrieved
/// sequence replaces any prior working set.
pub(crate) async fn retrieve(
    state: &mut ConversationState,
    retriever: &dyn RetrieverPort,
) -> Result<()> {
    info!(question = %state.question, "retrieving documents");

    let documents = retriever.retrieve(&state.question).await?;
    info!(count = documents.len(), "documents retrieved");

    state.history.push(ChatMessage::user(&state.question));
    state.documents = documents;
    Ok(())
}

/// Filters the working set down to documents graded relevant.
///
/// Order-preserving: each document is judged independently and kept
/// documents stay in retrieval order. An empty result is valid and forces
/// the rewrite path.
pub(crate) async fn grade_documents(
    state: &mut ConversationState,
    inference: &dyn InferencePort,
) -> Result<()> {
    info!(count = state.documents.len(), "grading document relevance");

    let mut filtered = Vec::new();
    for document in state.documents.drain(..) {
        let judgment = inference
            .grade_document(&state.question, &document.content)
            .await?;
        if judgment.is_yes() {
            debug!("document relevant");
            filtered.push(document);
        } else {
            debug!("document not relevant");
        }
    }

    info!(kept = filtered.len(), "document grading complete");
    state.documents = filtered;
    Ok(())
}

/// Routes to generation when relevant documents remain, otherwise forces a
/// rewrite-and-retry cycle.
pub fn decide_to_generate(documents: &[Document]) -> NodeKind {
    if documents.is_empty() {
        info!("no relevant documents, transforming query");
        NodeKind::TransformQuery
    } else {
        info!("relevant documents available, generating");
        NodeKind::Generate
    }
}

/// Rewrites the question into a self-contained form.
///
/// Metadata hints are extracted from the current (possibly empty) working
/// set and passed to the rewrite prompt; the rewritten question replaces the
/// current one and is recorded in history as if the user asked it. Always
/// routes to retrieval next.
pub(crate) async fn transform_query(
    state: &mut ConversationState,
    inference: &dyn InferencePort,
) -> Result<()> {
    info!(question = %state.question, "transforming query");

    let card_type = metadata_hint(&state.question, &state.documents, "card_type");
    let product_name = metadata_hint(&state.question, &state.documents, "product_name");
    let history = format_chat_history(&state.history);

    let rewritten = inference
        .rewrite_question(&state.question, &card_type, &product_name, &history)
        .await?;
    info!(rewritten = %rewritten, "query transformed");

    state.history.push(ChatMessage::user(&rewritten));
    state.question = rewritten;
    Ok(())
}

/// Picks the first metadata value under `key` that appears case-insensitively
/// as a substring of the question; the documents' retrieval order decides
/// which match wins.
fn metadata_hint(question: &str, documents: &[Document], key: &str) -> String {
    let question_lower = question.to_lowercase();
    documents
        .iter()
        .filter_map(|doc| doc.metadata.get(key))
        .find(|value| !value.is_empty() && question_lower.contains(&value.to_lowercase()))
        .cloned()
        .unwrap_or_else(|| NO_HINT.to_string())
}

/// Generates a RAG answer from the filtered documents.
///
/// May be re-entered by the hallucination gate; each re-entry re-invokes
/// generation from the same documents and question without mutating them.
pub(crate) async fn generate(
    state: &mut ConversationState,
    inference: &dyn InferencePort,
) -> Result<()> {
    info!("generating answer from documents");

    let context = document_context(&state.documents);
    let generation = inference.generate(&state.question, &context).await?;

    state.history.push(ChatMessage::assistant(&generation));
    state.generation = Some(generation);
    Ok(())
}

/// Generates an answer from chat history alone. Terminal node.
pub(crate) async fn generate_from_history(
    state: &mut ConversationState,
    inference: &dyn InferencePort,
) -> Result<()> {
    info!("generating answer from history");

    let history = format_chat_history(&state.history);
    let generation = inference
        .generate_from_history(&state.question, &history)
        .await?;

    state.history.push(ChatMessage::user(&state.question));
    state.history.push(ChatMessage::assistant(&generation));
    state.generation = Some(generation);
    Ok(())
}

/// Outcome of the hallucination/usefulness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationVerdict {
    /// Grounded and addresses the question; the turn completes.
    Useful,
    /// Grounded but off-question; triggers a fresh rewrite-and-retrieve cycle.
    NotUseful,
    /// Not supported by documents or history; generation is retried as-is.
    NotSupported,
}

/// Grades the generation for grounding, then usefulness.
///
/// The usefulness judgment only runs when the generation is grounded.
pub(crate) async fn grade_generation(
    state: &ConversationState,
    inference: &dyn InferencePort,
) -> Result<GenerationVerdict> {
    info!("checking generation grounding");

    let generation = state
        .generation
        .as_deref()
        .ok_or_else(|| TravlogError::internal("generation missing at the grading gate"))?;
    let context = document_context(&state.documents);
    let history = format_chat_history(&state.history);

    let grounded = inference
        .grade_hallucination(&context, generation, &history)
        .await?;
    if !grounded.is_yes() {
        info!("generation not grounded, retrying");
        return Ok(GenerationVerdict::NotSupported);
    }

    let addresses = inference.grade_answer(&state.question, generation).await?;
    if addresses.is_yes() {
        info!("generation addresses the question");
        Ok(GenerationVerdict::Useful)
    } else {
        info!("generation does not address the question");
        Ok(GenerationVerdict::NotUseful)
    }
}

/// Concatenates document contents into the generation prompt context.
fn document_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prestige_doc() -> Document {
        Document::new("연회비 안내")
            .with_metadata("card_type", "Prestige")
            .with_metadata("product_name", "트래블로그")
    }

    #[test]
    fn test_decide_path_is_total_over_intents() {
        assert_eq!(
            decide_path(Some(Intent::ChatOnly)).unwrap(),
            NodeKind::GenerateFromHistory
        );
        assert_eq!(
            decide_path(Some(Intent::ChatAndDocs)).unwrap(),
            NodeKind::TransformQuery
        );
        assert_eq!(
            decide_path(Some(Intent::DocsOnly)).unwrap(),
            NodeKind::Retrieve
        );
    }

    #[test]
    fn test_decide_path_rejects_unset_intent() {
        let err = decide_path(None).unwrap_err();
        assert!(matches!(err, TravlogError::Internal(_)));
    }

    #[test]
    fn test_decide_to_generate_forces_rewrite_on_empty() {
        assert_eq!(decide_to_generate(&[]), NodeKind::TransformQuery);
        assert_eq!(
            decide_to_generate(&[Document::new("약관")]),
            NodeKind::Generate
        );
    }

    #[test]
    fn test_metadata_hint_matches_case_insensitively() {
        let docs = vec![prestige_doc()];

        let hint = metadata_hint("prestige 카드 연회비는?", &docs, "card_type");

        assert_eq!(hint, "Prestige");
    }

    #[test]
    fn test_metadata_hint_first_match_wins() {
        let docs = vec![
            Document::new("a").with_metadata("card_type", "Skypass"),
            Document::new("b").with_metadata("card_type", "Prestige"),
        ];

        let hint = metadata_hint("skypass랑 prestige 비교해줘", &docs, "card_type");

        assert_eq!(hint, "Skypass");
    }

    #[test]
    fn test_metadata_hint_falls_back_to_sentinel() {
        let docs = vec![prestige_doc()];

        assert_eq!(metadata_hint("연회비 알려줘", &docs, "card_type"), NO_HINT);
        assert_eq!(metadata_hint("연회비 알려줘", &[], "product_name"), NO_HINT);
    }
}
