//! Per-session audit log of conversation turns.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use travlog_core::session::ChatMessage;
use travlog_core::{Result, TravlogError};

/// Persists a session's conversation transcript after each turn.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Appends messages to the session's transcript for today.
    ///
    /// When `is_append` is set, `messages` are merged onto the existing
    /// file; otherwise they replace it. The turn boundary sets the flag
    /// once a session's transcript has grown past the initial exchange.
    async fn record(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
        is_append: bool,
    ) -> Result<()>;
}

/// Writes transcripts as JSON files under a history directory.
///
/// One file per session per calendar day, named
/// `{session_id}_chat_history_{YYYY-MM-DD}.json`.
pub struct JsonHistoryRepository {
    base_dir: PathBuf,
}

impl JsonHistoryRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn file_path(&self, session_id: &str) -> PathBuf {
        let date = chrono::Local::now().format("%Y-%m-%d");
        self.base_dir
            .join(format!("{session_id}_chat_history_{date}.json"))
    }

    async fn read_existing(path: &Path) -> Result<Vec<ChatMessage>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let messages = serde_json::from_str(&raw).map_err(|e| {
                    TravlogError::serialization("json", format!("history {}: {}", path.display(), e))
                })?;
                Ok(messages)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(TravlogError::io(format!(
                "failed to read history {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl HistoryRepository for JsonHistoryRepository {
    async fn record(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
        is_append: bool,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| {
                TravlogError::io(format!(
                    "failed to create history dir {}: {}",
                    self.base_dir.display(),
                    e
                ))
            })?;

        let path = self.file_path(session_id);
        let mut transcript = if is_append {
            Self::read_existing(&path).await?
        } else {
            Vec::new()
        };
        transcript.extend_from_slice(messages);

        let raw = serde_json::to_string_pretty(&transcript)?;
        tokio::fs::write(&path, raw).await.map_err(|e| {
            TravlogError::io(format!(
                "failed to write history {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(session_id, count = transcript.len(), "history recorded");
        Ok(())
    }
}
