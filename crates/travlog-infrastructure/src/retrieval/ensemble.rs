//! Hybrid retrieval: weighted reciprocal rank fusion of several retrievers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use travlog_core::Result;
use travlog_core::document::Document;
use travlog_core::ports::RetrieverPort;

/// Rank-fusion smoothing constant (reciprocal rank fusion's `c`).
pub const DEFAULT_RRF_C: f64 = 60.0;

/// Default fusion weights: 0.6 semantic, 0.4 lexical.
pub const DEFAULT_WEIGHTS: [f64; 2] = [0.6, 0.4];

/// Fuses the ranked outputs of several retrievers into one ordered list.
///
/// Each inner retriever contributes `weight / (c + rank)` per document;
/// fused order is by descending total score. Documents are identified by
/// content, so the same document surfacing in both rankings accumulates
/// both contributions.
pub struct EnsembleRetriever {
    retrievers: Vec<(Arc<dyn RetrieverPort>, f64)>,
    c: f64,
}

impl EnsembleRetriever {
    pub fn new(retrievers: Vec<(Arc<dyn RetrieverPort>, f64)>) -> Self {
        Self {
            retrievers,
            c: DEFAULT_RRF_C,
        }
    }

    pub fn with_smoothing(mut self, c: f64) -> Self {
        self.c = c;
        self
    }
}

#[async_trait]
impl RetrieverPort for EnsembleRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        // key -> (fused score, first-seen order, document)
        let mut fused: HashMap<String, (f64, usize, Document)> = HashMap::new();
        let mut seen = 0usize;

        for (retriever, weight) in &self.retrievers {
            let ranked = retriever.retrieve(query).await?;
            for (rank, document) in ranked.into_iter().enumerate() {
                let contribution = weight / (self.c + (rank + 1) as f64);
                let entry = fused
                    .entry(document.content.clone())
                    .or_insert_with(|| (0.0, seen, document));
                entry.0 += contribution;
                seen += 1;
            }
        }

        let mut results: Vec<(f64, usize, Document)> = fused.into_values().collect();
        // Descending score, first-seen order as a deterministic tiebreak.
        results.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        debug!(count = results.len(), "ensemble fusion complete");
        Ok(results
            .into_iter()
            .map(|(_, _, document)| document)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRetriever(Vec<Document>);

    #[async_trait]
    impl RetrieverPort for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }
    }

    fn doc(content: &str) -> Document {
        Document::new(content)
    }

    #[tokio::test]
    async fn test_document_in_both_rankings_wins() {
        let dense = Arc::new(FixedRetriever(vec![doc("shared"), doc("dense-only")]));
        let lexical = Arc::new(FixedRetriever(vec![doc("lexical-only"), doc("shared")]));
        let ensemble = EnsembleRetriever::new(vec![(dense, 0.6), (lexical, 0.4)]);

        let results = ensemble.retrieve("q").await.unwrap();

        assert_eq!(results[0].content, "shared");
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_weights_break_single_list_ties() {
        let dense = Arc::new(FixedRetriever(vec![doc("a")]));
        let lexical = Arc::new(FixedRetriever(vec![doc("b")]));
        let ensemble = EnsembleRetriever::new(vec![(dense, 0.6), (lexical, 0.4)]);

        let results = ensemble.retrieve("q").await.unwrap();

        // Same rank in both lists; the heavier weight wins.
        assert_eq!(results[0].content, "a");
        assert_eq!(results[1].content, "b");
    }

    #[tokio::test]
    async fn test_empty_inner_results_yield_empty_fusion() {
        let dense = Arc::new(FixedRetriever(Vec::new()));
        let lexical = Arc::new(FixedRetriever(Vec::new()));
        let ensemble = EnsembleRetriever::new(vec![(dense, 0.6), (lexical, 0.4)]);

        let results = ensemble.retrieve("q").await.unwrap();

        assert!(results.is_empty());
    }
}
