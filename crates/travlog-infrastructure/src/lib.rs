//! Infrastructure layer: retrieval indices, corpus loading and history
//! persistence.
//!
//! Everything here implements a port defined in `travlog-core` or feeds
//! one; the orchestration graph never touches the file system or any
//! search index directly.

pub mod corpus;
pub mod history;
pub mod retrieval;

pub use corpus::load_corpus;
pub use history::{HistoryRepository, JsonHistoryRepository};
pub use retrieval::{
    Bm25Retriever, DenseRetriever, EmbeddingPort, EnsembleRetriever, HttpEmbedder,
};
