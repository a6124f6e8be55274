//! Retrieved document model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document returned by the retrieval port.
///
/// Documents are immutable from the graph's point of view: the retriever
/// owns their content and the orchestration only filters and reads them.
/// The metadata map carries product fields (`card_type`, `product_name`)
/// used to disambiguate follow-up questions during query rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// The document body fed to grading and generation prompts.
    pub content: String,
    /// String-to-string metadata attached by the retriever.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Creates a document with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry, builder style.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
