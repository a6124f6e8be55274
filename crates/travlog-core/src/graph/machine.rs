//! The orchestration state machine.
//!
//! The graph is an explicit node enum plus a transition loop, so the cycles
//! and their bound are first-class constructs rather than being implicit in
//! a graph engine's recursion counter. Two cycles are live:
//! `transform_query -> retrieve -> grade_documents -> transform_query` and
//! `generate -> generate`. The machine leaves them only through the
//! per-turn recursion limit.

use super::nodes::{self, GenerationVerdict};
use super::state::ConversationState;
use crate::error::{Result, TravlogError};
use crate::ports::{InferencePort, RetrieverPort};
use crate::session::ChatMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tokio::sync::mpsc;
use tracing::Instrument;

/// The decision nodes of the turn-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ClassifyIntent,
    Retrieve,
    GradeDocuments,
    TransformQuery,
    Generate,
    GenerateFromHistory,
}

/// Per-turn execution configuration, owned by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Session identifier attached to the turn's tracing span.
    pub thread_id: String,
    /// Maximum number of node executions before the turn aborts.
    pub recursion_limit: usize,
}

/// One incremental state snapshot, emitted after a node executes.
#[derive(Debug, Clone)]
pub struct TurnDelta {
    pub node: NodeKind,
    pub state: ConversationState,
}

/// Events produced by a streamed turn execution.
///
/// The stream is finite: zero or more `Delta`s followed by exactly one
/// `Completed` or `Failed`.
#[derive(Debug)]
pub enum TurnEvent {
    Delta(TurnDelta),
    Completed(ConversationState),
    Failed(TravlogError),
}

/// The conversation orchestration graph.
///
/// Holds the two injected ports; each [`Graph::stream`] or [`Graph::run`]
/// call is a fresh, restartable execution over its own state.
pub struct Graph {
    inference: Arc<dyn InferencePort>,
    retriever: Arc<dyn RetrieverPort>,
}

impl Graph {
    pub fn new(inference: Arc<dyn InferencePort>, retriever: Arc<dyn RetrieverPort>) -> Self {
        Self {
            inference,
            retriever,
        }
    }

    /// Runs one turn to completion, returning the final state.
    pub async fn run(
        &self,
        question: impl Into<String>,
        history: Vec<ChatMessage>,
        config: &GraphConfig,
    ) -> Result<ConversationState> {
        let state = ConversationState::new(question, history);
        Self::execute(
            self.inference.as_ref(),
            self.retriever.as_ref(),
            state,
            config,
            None,
        )
        .await
    }

    /// Runs one turn on a background task, streaming a delta after every
    /// node execution.
    ///
    /// Dropping the receiver cancels the turn at the next node boundary;
    /// deltas already delivered stand.
    pub fn stream(
        &self,
        question: impl Into<String>,
        history: Vec<ChatMessage>,
        config: GraphConfig,
    ) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(16);
        let inference = Arc::clone(&self.inference);
        let retriever = Arc::clone(&self.retriever);
        let state = ConversationState::new(question, history);

        let span = tracing::info_span!("turn", thread_id = %config.thread_id);
        tokio::spawn(
            async move {
                let outcome = Self::execute(
                    inference.as_ref(),
                    retriever.as_ref(),
                    state,
                    &config,
                    Some(&tx),
                )
                .await;

                let event = match outcome {
                    Ok(state) => TurnEvent::Completed(state),
                    Err(err) => TurnEvent::Failed(err),
                };
                let _ = tx.send(event).await;
            }
            .instrument(span),
        );

        rx
    }

    /// Drives the transition loop.
    ///
    /// Every node execution counts one step against the recursion limit;
    /// exceeding the limit is the expected abort path for the live cycles.
    async fn execute(
        inference: &dyn InferencePort,
        retriever: &dyn RetrieverPort,
        mut state: ConversationState,
        config: &GraphConfig,
        tx: Option<&mpsc::Sender<TurnEvent>>,
    ) -> Result<ConversationState> {
        let mut node = NodeKind::ClassifyIntent;
        let mut steps = 0usize;

        loop {
            if steps >= config.recursion_limit {
                return Err(TravlogError::recursion_limit(config.recursion_limit));
            }
            steps += 1;

            let next = match node {
                NodeKind::ClassifyIntent => {
                    nodes::classify_intent(&mut state, inference).await?;
                    Some(nodes::decide_path(state.intent)?)
                }
                NodeKind::Retrieve => {
                    nodes::retrieve(&mut state, retriever).await?;
                    Some(NodeKind::GradeDocuments)
                }
                NodeKind::GradeDocuments => {
                    nodes::grade_documents(&mut state, inference).await?;
                    Some(nodes::decide_to_generate(&state.documents))
                }
                NodeKind::TransformQuery => {
                    nodes::transform_query(&mut state, inference).await?;
                    Some(NodeKind::Retrieve)
                }
                NodeKind::Generate => {
                    nodes::generate(&mut state, inference).await?;
                    match nodes::grade_generation(&state, inference).await? {
                        GenerationVerdict::NotSupported => Some(NodeKind::Generate),
                        GenerationVerdict::NotUseful => Some(NodeKind::TransformQuery),
                        GenerationVerdict::Useful => None,
                    }
                }
                NodeKind::GenerateFromHistory => {
                    nodes::generate_from_history(&mut state, inference).await?;
                    None
                }
            };

            Self::emit(tx, node, &state).await?;

            match next {
                Some(n) => node = n,
                None => return Ok(state),
            }
        }
    }

    async fn emit(
        tx: Option<&mpsc::Sender<TurnEvent>>,
        node: NodeKind,
        state: &ConversationState,
    ) -> Result<()> {
        if let Some(tx) = tx {
            let delta = TurnDelta {
                node,
                state: state.clone(),
            };
            tx.send(TurnEvent::Delta(delta))
                .await
                .map_err(|_| TravlogError::internal("turn delta consumer dropped"))?;
        }
        Ok(())
    }
}
