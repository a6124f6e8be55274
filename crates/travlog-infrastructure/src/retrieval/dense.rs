//! Semantic retrieval over embedded document vectors.
//!
//! The embedding model itself is an external collaborator behind
//! [`EmbeddingPort`]; this module only owns the vector store and cosine
//! ranking.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use travlog_core::document::Document;
use travlog_core::ports::RetrieverPort;
use travlog_core::{Result, TravlogError};

const DEFAULT_EMBED_URL: &str = "http://localhost:8080/v1/embeddings";
const DEFAULT_EMBED_MODEL: &str = "bge-m3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of dense results per query.
pub const DEFAULT_DENSE_K: usize = 3;

/// Text embedding capability.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| TravlogError::config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Loads configuration from `TRAVLOG_EMBED_URL` / `TRAVLOG_EMBED_MODEL`.
    pub fn try_from_env() -> Result<Self> {
        let base_url = env::var("TRAVLOG_EMBED_URL").unwrap_or_else(|_| DEFAULT_EMBED_URL.into());
        let model = env::var("TRAVLOG_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.into());
        Self::new(base_url, model)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingPort for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|err| TravlogError::port("embedding", format!("request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(TravlogError::port(
                "embedding",
                format!("HTTP {}", response.status()),
            ));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|err| {
            TravlogError::port("embedding", format!("failed to parse response: {err}"))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| TravlogError::port("embedding", "backend returned no embedding"))
    }
}

/// Dense retriever over a pre-embedded in-memory corpus.
pub struct DenseRetriever {
    embedder: Arc<dyn EmbeddingPort>,
    entries: Vec<(Vec<f32>, Document)>,
    k: usize,
}

impl DenseRetriever {
    /// Embeds the corpus up front and builds the store.
    pub async fn index(embedder: Arc<dyn EmbeddingPort>, documents: Vec<Document>) -> Result<Self> {
        Self::index_with_k(embedder, documents, DEFAULT_DENSE_K).await
    }

    pub async fn index_with_k(
        embedder: Arc<dyn EmbeddingPort>,
        documents: Vec<Document>,
        k: usize,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            let vector = embedder.embed(&document.content).await?;
            entries.push((vector, document));
        }

        Ok(Self {
            embedder,
            entries,
            k,
        })
    }
}

#[async_trait]
impl RetrieverPort for DenseRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed(query).await?;

        let mut scored: Vec<(f32, &Document)> = self
            .entries
            .iter()
            .map(|(vector, document)| (cosine_similarity(&query_vector, vector), document))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.k)
            .map(|(_, document)| document.clone())
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic toy embedder: counts occurrences of fixed keywords.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingPort for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(["연회비", "atm", "마일리지"]
                .iter()
                .map(|kw| lower.matches(kw).count() as f32)
                .collect())
        }
    }

    #[tokio::test]
    async fn test_ranks_by_cosine_similarity() {
        let documents = vec![
            Document::new("연회비 연회비 안내"),
            Document::new("ATM 인출 한도"),
        ];
        let retriever = DenseRetriever::index(Arc::new(KeywordEmbedder), documents)
            .await
            .unwrap();

        let results = retriever.retrieve("연회비가 얼마인가요").await.unwrap();

        assert_eq!(results[0].content, "연회비 연회비 안내");
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
