//! The turn boundary: admission control, session bookkeeping and the
//! user-facing mapping of turn failures.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use travlog_core::Result;
use travlog_core::graph::{Graph, TurnEvent};
use travlog_core::session::{ChatMessage, SessionHandle, SessionManager};
use travlog_infrastructure::HistoryRepository;

/// System-wide cap on concurrently executing turns.
pub const MAX_CONCURRENT_TURNS: usize = 20;

/// Shown when a turn aborts on the recursion limit.
pub const RECURSION_FALLBACK: &str =
    "정확한 정보가 부족해, 답변을 생성하지 못했습니다. 카드 상품명을 포함해 재질의 해주시기 바랍니다.";

/// Shown for any other turn failure.
pub const PROCESSING_ERROR_FALLBACK: &str = "처리 중 오류가 발생했습니다. 다시 시도해 주세요.";

/// Outcome of one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub session_id: String,
    /// The assistant's final message, or a fallback string when the turn
    /// failed. Empty when the turn was cancelled before generating.
    pub answer: String,
    pub cancelled: bool,
}

/// Drives conversational turns end to end.
///
/// `ChatService` owns admission control (a global semaphore of
/// [`MAX_CONCURRENT_TURNS`] permits, tokio-fair), serializes turns within a
/// session via the session's turn lock, and is the only place that commits
/// graph-produced history back onto the session. Turn failures never escape
/// as errors; they are mapped to fixed fallback answers here.
pub struct ChatService {
    sessions: Arc<SessionManager>,
    graph: Arc<Graph>,
    history: Arc<dyn HistoryRepository>,
    permits: Arc<Semaphore>,
}

impl ChatService {
    pub fn new(
        sessions: Arc<SessionManager>,
        graph: Arc<Graph>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            sessions,
            graph,
            history,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_TURNS)),
        }
    }

    /// Runs one turn for the given session (created on first contact).
    ///
    /// Returns the assistant's answer, or a fallback message when the turn
    /// failed. History appends committed before a cancellation stand.
    pub async fn send(&self, session_id: Option<&str>, question: &str) -> Result<ChatReply> {
        let handle = self.sessions.get_or_create(session_id).await;
        // Turns of one session never interleave.
        let _turn = handle.turn_lock().lock().await;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| travlog_core::TravlogError::internal("turn semaphore closed"))?;

        let snapshot = handle.messages().await;
        let prior_len = snapshot.len();
        let config = handle.graph_config().await;
        let session_id = handle.session_id().to_string();

        info!(session_id, "turn started");
        let mut rx = self.graph.stream(question, snapshot, config);

        let mut last_seen = None;
        let outcome = loop {
            match rx.recv().await {
                Some(TurnEvent::Delta(delta)) => {
                    last_seen = Some(delta.state);
                    if handle.stop_requested().await {
                        // Dropping the receiver cancels at the next node
                        // boundary.
                        drop(rx);
                        break TurnOutcome::Cancelled(last_seen.take());
                    }
                }
                Some(TurnEvent::Completed(state)) => break TurnOutcome::Completed(state),
                Some(TurnEvent::Failed(err)) => break TurnOutcome::Failed(err),
                None => {
                    break TurnOutcome::Failed(travlog_core::TravlogError::internal(
                        "turn ended without a terminal event",
                    ));
                }
            }
        };

        match outcome {
            TurnOutcome::Completed(state) => {
                let answer = state.generation.clone().unwrap_or_default();
                self.commit(&handle, &state.history[prior_len..]).await;
                self.audit(&session_id, &handle, prior_len).await;
                info!(session_id, "turn completed");
                Ok(ChatReply {
                    session_id,
                    answer,
                    cancelled: false,
                })
            }
            TurnOutcome::Cancelled(state) => {
                if let Some(state) = state {
                    self.commit(&handle, &state.history[prior_len..]).await;
                }
                handle.set_stop_flag(false).await;
                info!(session_id, "turn cancelled");
                Ok(ChatReply {
                    session_id,
                    answer: String::new(),
                    cancelled: true,
                })
            }
            TurnOutcome::Failed(err) => {
                let answer = if err.is_recursion_limit() {
                    info!(session_id, "turn aborted on recursion limit");
                    RECURSION_FALLBACK
                } else {
                    warn!(session_id, error = %err, "turn failed");
                    PROCESSING_ERROR_FALLBACK
                };
                let tail = [ChatMessage::user(question), ChatMessage::assistant(answer)];
                self.commit(&handle, &tail).await;
                self.audit(&session_id, &handle, prior_len).await;
                Ok(ChatReply {
                    session_id,
                    answer: answer.to_string(),
                    cancelled: false,
                })
            }
        }
    }

    /// Requests cancellation of the session's in-flight turn.
    pub async fn stop(&self, session_id: &str) {
        self.sessions
            .get_or_create(Some(session_id))
            .await
            .set_stop_flag(true)
            .await;
    }

    async fn commit(&self, handle: &SessionHandle, messages: &[ChatMessage]) {
        for message in messages {
            handle.append_message(message.clone()).await;
        }
    }

    /// Appends the turn's final user/assistant pair to the audit log.
    ///
    /// Audit failures are logged, not surfaced; the user already has their
    /// answer.
    async fn audit(&self, session_id: &str, handle: &SessionHandle, prior_len: usize) {
        let messages = handle.messages().await;
        let pair_start = messages.len().saturating_sub(2);
        // Start a new file on the session's first turn, where the prior
        // transcript held only the greeting.
        let is_append = prior_len > 1;
        if let Err(err) = self
            .history
            .record(session_id, &messages[pair_start..], is_append)
            .await
        {
            warn!(session_id, error = %err, "history record failed");
        }
    }
}

enum TurnOutcome {
    Completed(travlog_core::graph::ConversationState),
    Cancelled(Option<travlog_core::graph::ConversationState>),
    Failed(travlog_core::TravlogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use travlog_core::document::Document;
    use travlog_core::ports::{InferencePort, Judgment, RetrieverPort};
    use travlog_core::session::SESSION_GREETING;

    /// Scripted inference: happy document path unless configured otherwise.
    struct ScriptedInference {
        chat_vs_docs: Judgment,
        chat_type: Judgment,
        document_grade: Judgment,
    }

    impl ScriptedInference {
        fn docs_path() -> Self {
            Self {
                chat_vs_docs: Judgment::No,
                chat_type: Judgment::No,
                document_grade: Judgment::Yes,
            }
        }

        fn chat_path() -> Self {
            Self {
                chat_vs_docs: Judgment::Yes,
                chat_type: Judgment::No,
                document_grade: Judgment::Yes,
            }
        }
    }

    #[async_trait]
    impl InferencePort for ScriptedInference {
        async fn chat_vs_docs(&self, _q: &str, _h: &str) -> Result<Judgment> {
            Ok(self.chat_vs_docs)
        }
        async fn chat_type(&self, _q: &str, _h: &str) -> Result<Judgment> {
            Ok(self.chat_type)
        }
        async fn grade_document(&self, _q: &str, _d: &str) -> Result<Judgment> {
            Ok(self.document_grade)
        }
        async fn grade_hallucination(&self, _d: &str, _g: &str, _h: &str) -> Result<Judgment> {
            Ok(Judgment::Yes)
        }
        async fn grade_answer(&self, _q: &str, _g: &str) -> Result<Judgment> {
            Ok(Judgment::Yes)
        }
        async fn generate(&self, _q: &str, _c: &str) -> Result<String> {
            Ok("수수료는 면제입니다.".to_string())
        }
        async fn generate_from_history(&self, _q: &str, _h: &str) -> Result<String> {
            Ok("안녕하세요!".to_string())
        }
        async fn rewrite_question(
            &self,
            question: &str,
            _card_type: &str,
            _product_name: &str,
            _history: &str,
        ) -> Result<String> {
            Ok(format!("다시 쓴 질문: {question}"))
        }
    }

    struct FixedRetriever(Vec<Document>);

    #[async_trait]
    impl RetrieverPort for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingHistory {
        calls: Mutex<Vec<(String, Vec<ChatMessage>, bool)>>,
    }

    #[async_trait]
    impl HistoryRepository for RecordingHistory {
        async fn record(
            &self,
            session_id: &str,
            messages: &[ChatMessage],
            is_append: bool,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((session_id.to_string(), messages.to_vec(), is_append));
            Ok(())
        }
    }

    fn service(
        inference: ScriptedInference,
        documents: Vec<Document>,
    ) -> (ChatService, Arc<SessionManager>, Arc<RecordingHistory>) {
        let history = Arc::new(RecordingHistory::default());
        let sessions = Arc::new(SessionManager::new());
        let graph = Arc::new(Graph::new(
            Arc::new(inference),
            Arc::new(FixedRetriever(documents)),
        ));
        let service = ChatService::new(sessions.clone(), graph, history.clone());
        (service, sessions, history)
    }

    #[tokio::test]
    async fn test_docs_turn_commits_question_and_answer() {
        let (service, _, history) = service(
            ScriptedInference::docs_path(),
            vec![Document::new("수수료 안내")],
        );

        let reply = service.send(None, "수수료 알려줘").await.unwrap();

        assert!(!reply.cancelled);
        assert_eq!(reply.answer, "수수료는 면제입니다.");

        let calls = history.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (_, pair, is_append) = &calls[0];
        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0].content, "수수료 알려줘");
        assert_eq!(pair[1].content, "수수료는 면제입니다.");
        assert!(!*is_append, "first turn starts a fresh audit file");
    }

    #[tokio::test]
    async fn test_second_turn_appends_to_audit_log() {
        let (service, _, history) = service(ScriptedInference::chat_path(), Vec::new());

        let first = service.send(None, "안녕").await.unwrap();
        service.send(Some(&first.session_id), "고마워").await.unwrap();

        let calls = history.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].2);
        assert!(calls[1].2);
    }

    #[tokio::test]
    async fn test_session_history_grows_across_turns() {
        let (service, sessions, _) = service(ScriptedInference::chat_path(), Vec::new());

        let reply = service.send(None, "안녕").await.unwrap();
        let handle = sessions.get_or_create(Some(&reply.session_id)).await;
        let messages = handle.messages().await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, SESSION_GREETING);
        assert_eq!(messages[1].content, "안녕");
        assert_eq!(messages[2].content, "안녕하세요!");
    }

    #[tokio::test]
    async fn test_recursion_abort_yields_fallback_answer() {
        // Empty corpus makes every retrieval come back empty, so the turn
        // cycles rewrite/retrieve until the limit trips.
        let (service, sessions, history) = service(ScriptedInference::docs_path(), Vec::new());

        let reply = service.send(None, "수수료 알려줘").await.unwrap();

        assert_eq!(reply.answer, RECURSION_FALLBACK);

        let handle = sessions.get_or_create(Some(&reply.session_id)).await;
        let messages = handle.messages().await;
        assert_eq!(messages.last().unwrap().content, RECURSION_FALLBACK);
        assert_eq!(messages[1].content, "수수료 알려줘");

        let calls = history.calls.lock().unwrap();
        assert_eq!(calls[0].1.last().unwrap().content, RECURSION_FALLBACK);
    }

    #[tokio::test]
    async fn test_stop_flag_cancels_turn() {
        let (service, sessions, history) = service(ScriptedInference::chat_path(), Vec::new());

        let handle = sessions.get_or_create(Some("sess-stop")).await;
        handle.set_stop_flag(true).await;

        let reply = service.send(Some("sess-stop"), "안녕").await.unwrap();

        assert!(reply.cancelled);
        assert!(reply.answer.is_empty());
        // Cancellation hit before any history-appending node ran.
        assert_eq!(handle.messages().await.len(), 1);
        assert!(history.calls.lock().unwrap().is_empty());
        // The flag is consumed; the next turn runs normally.
        assert!(!handle.stop_requested().await);
        let next = service.send(Some("sess-stop"), "안녕").await.unwrap();
        assert!(!next.cancelled);
    }
}
