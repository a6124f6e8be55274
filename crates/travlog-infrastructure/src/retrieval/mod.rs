mod bm25;
mod dense;
mod ensemble;

pub use bm25::{Bm25Retriever, DEFAULT_LEXICAL_K};
pub use dense::{DEFAULT_DENSE_K, DenseRetriever, EmbeddingPort, HttpEmbedder};
pub use ensemble::{DEFAULT_RRF_C, DEFAULT_WEIGHTS, EnsembleRetriever};
