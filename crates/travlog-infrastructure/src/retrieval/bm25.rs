//! Lexical retrieval over an in-memory BM25 index.

use async_trait::async_trait;
use std::collections::HashMap;
use travlog_core::Result;
use travlog_core::document::Document;
use travlog_core::ports::RetrieverPort;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Default number of lexical results per query.
pub const DEFAULT_LEXICAL_K: usize = 2;

/// In-memory BM25 retriever over a fixed document corpus.
///
/// The index is built once at construction; the corpus is small enough
/// (product terms documents) that rebuilding on corpus change is cheap.
pub struct Bm25Retriever {
    documents: Vec<Document>,
    /// term -> (document index -> term frequency)
    postings: HashMap<String, HashMap<usize, usize>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
    k: usize,
}

impl Bm25Retriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::with_k(documents, DEFAULT_LEXICAL_K)
    }

    pub fn with_k(documents: Vec<Document>, k: usize) -> Self {
        let mut postings: HashMap<String, HashMap<usize, usize>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (idx, doc) in documents.iter().enumerate() {
            let terms = tokenize(&doc.content);
            doc_lengths.push(terms.len());
            for term in terms {
                *postings.entry(term).or_default().entry(idx).or_insert(0) += 1;
            }
        }

        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<usize>() as f64 / doc_lengths.len() as f64
        };

        Self {
            documents,
            postings,
            doc_lengths,
            avg_doc_length,
            k,
        }
    }

    /// Scores all documents against the query and returns the top `k`,
    /// highest score first.
    fn rank(&self, query: &str) -> Vec<usize> {
        let total_docs = self.documents.len() as f64;
        let mut scores = vec![0.0f64; self.documents.len()];

        for term in tokenize(query) {
            let Some(docs) = self.postings.get(&term) else {
                continue;
            };
            let df = docs.len() as f64;
            let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (&idx, &tf) in docs {
                let tf = tf as f64;
                let norm = K1 * (1.0 - B + B * self.doc_lengths[idx] as f64 / self.avg_doc_length);
                scores[idx] += idf * (tf * (K1 + 1.0)) / (tf + norm);
            }
        }

        let mut ranked: Vec<usize> = (0..self.documents.len())
            .filter(|&idx| scores[idx] > 0.0)
            .collect();
        // Stable sort keeps corpus order for equal scores.
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        ranked.truncate(self.k);
        ranked
    }
}

#[async_trait]
impl RetrieverPort for Bm25Retriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        Ok(self
            .rank(query)
            .into_iter()
            .map(|idx| self.documents[idx].clone())
            .collect())
    }
}

/// Lowercased alphanumeric tokens; everything else is a separator.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
