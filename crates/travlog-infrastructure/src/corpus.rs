//! Corpus loading for the retrieval indices.

use std::path::Path;
use tracing::info;
use travlog_core::document::Document;
use travlog_core::{Result, TravlogError};

/// Loads a document corpus from a JSON file.
///
/// The file holds an array of documents, each with a `content` string and
/// an optional `metadata` object of string fields.
pub async fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        TravlogError::io(format!("failed to read corpus {}: {}", path.display(), e))
    })?;
    let documents: Vec<Document> = serde_json::from_str(&raw).map_err(|e| {
        TravlogError::serialization("json", format!("corpus {}: {}", path.display(), e))
    })?;
    info!(count = documents.len(), path = %path.display(), "corpus loaded");
    Ok(documents)
}
