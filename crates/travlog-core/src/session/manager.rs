//! Session lifecycle management.

use super::message::ChatMessage;
use super::model::SessionState;
use crate::graph::GraphConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// One session's shared state plus its turn serialization lock.
///
/// The handle is the sole owner of the session's message history; nodes of
/// an in-flight turn work on a snapshot and the application commits appends
/// back through [`SessionHandle::append_message`].
pub struct SessionHandle {
    session_id: String,
    state: RwLock<SessionState>,
    /// Serializes turns within one session. Turns across sessions run
    /// concurrently; two turns of the same session must not interleave
    /// because they both append to the same history.
    turn_lock: Mutex<()>,
}

impl SessionHandle {
    fn new(state: SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            state: RwLock::new(state),
            turn_lock: Mutex::new(()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Lock guarding turn execution for this session. Hold the guard for
    /// the whole turn so turns are processed in submission order.
    pub fn turn_lock(&self) -> &Mutex<()> {
        &self.turn_lock
    }

    /// Returns a snapshot of the current conversation history.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    /// Appends a message to the session history.
    pub async fn append_message(&self, message: ChatMessage) {
        self.state.write().await.messages.push(message);
    }

    /// Returns the graph execution config for this session.
    pub async fn graph_config(&self) -> GraphConfig {
        self.state.read().await.graph_config()
    }

    /// Requests (or withdraws) cancellation of the in-flight turn.
    pub async fn set_stop_flag(&self, stop: bool) {
        self.state.write().await.stop_flag = stop;
    }

    pub async fn stop_requested(&self) -> bool {
        self.state.read().await.stop_flag
    }

    /// Resets the session to its initial greeted state.
    async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = SessionState::new(self.session_id.clone());
    }
}

/// Maps conversation identifiers to isolated session state.
///
/// `SessionManager` is the sole mutator of the session-to-state mapping.
/// Creation is serialized under the map's write lock so two simultaneous
/// first messages for an unseen session id cannot create two divergent
/// session objects.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `session_id`, creating it on first contact.
    ///
    /// Passing `None` allocates a fresh UUID-keyed session.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> Arc<SessionHandle> {
        let id = match session_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        // Fast path: the common case is an existing session.
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(&id) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SessionHandle::new(SessionState::new(id))))
            .clone()
    }

    /// Appends a message to the given session, creating it if needed.
    pub async fn append_message(&self, session_id: &str, message: ChatMessage) {
        self.get_or_create(Some(session_id))
            .await
            .append_message(message)
            .await;
    }

    /// Returns the message history of the given session.
    pub async fn messages(&self, session_id: &str) -> Vec<ChatMessage> {
        self.get_or_create(Some(session_id)).await.messages().await
    }

    /// Returns the graph execution config of the given session.
    pub async fn graph_config(&self, session_id: &str) -> GraphConfig {
        self.get_or_create(Some(session_id))
            .await
            .graph_config()
            .await
    }

    /// Resets the given session's conversation history.
    ///
    /// The handle itself is kept, so callers holding a reference observe the
    /// reset instead of diverging onto a stale session.
    pub async fn clear(&self, session_id: &str) {
        let sessions = self.sessions.read().await;
        if let Some(handle) = sessions.get(session_id) {
            handle.reset().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::SESSION_GREETING;

    #[tokio::test]
    async fn test_get_or_create_returns_same_handle() {
        let manager = SessionManager::new();

        let first = manager.get_or_create(Some("s-1")).await;
        let second = manager.get_or_create(Some("s-1")).await;

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_fresh_session_is_greeted() {
        let manager = SessionManager::new();

        let messages = manager.messages("s-greet").await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, SESSION_GREETING);
    }

    #[tokio::test]
    async fn test_concurrent_first_contact_creates_one_session() {
        let manager = Arc::new(SessionManager::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_create(Some("race")).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }

    #[tokio::test]
    async fn test_append_and_clear() {
        let manager = SessionManager::new();

        manager
            .append_message("s-2", ChatMessage::user("안녕"))
            .await;
        assert_eq!(manager.messages("s-2").await.len(), 2);

        manager.clear("s-2").await;
        let messages = manager.messages("s-2").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, SESSION_GREETING);
    }

    #[tokio::test]
    async fn test_graph_config_carries_session_id() {
        let manager = SessionManager::new();

        let config = manager.graph_config("s-3").await;

        assert_eq!(config.thread_id, "s-3");
        assert_eq!(
            config.recursion_limit,
            crate::session::model::DEFAULT_RECURSION_LIMIT
        );
    }
}
