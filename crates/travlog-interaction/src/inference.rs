//! [`InferencePort`] implementation over the chat-completions client.

use crate::client::LlamaClient;
use crate::prompts;
use async_trait::async_trait;
use minijinja::context;
use tracing::debug;
use travlog_core::Result;
use travlog_core::ports::{InferencePort, Judgment};

/// LLM-backed grading, generation and rewriting.
///
/// Each capability renders its prompt template, makes one completion call,
/// and, for graders, parses the yes/no judgment defensively. A response
/// that cannot be parsed fails the call rather than guessing a verdict.
pub struct LlamaInference {
    client: LlamaClient,
}

impl LlamaInference {
    pub fn new(client: LlamaClient) -> Self {
        Self { client }
    }

    /// Builds the inference layer from environment configuration.
    pub fn try_from_env() -> Result<Self> {
        Ok(Self::new(LlamaClient::try_from_env()?))
    }

    async fn judge(&self, capability: &'static str, prompt: String) -> Result<Judgment> {
        let raw = self.client.complete(capability, &prompt).await?;
        let judgment = Judgment::parse(&raw)?;
        debug!(capability, ?judgment, "grader verdict");
        Ok(judgment)
    }

    async fn complete_text(&self, capability: &'static str, prompt: String) -> Result<String> {
        let raw = self.client.complete(capability, &prompt).await?;
        Ok(raw.trim().to_string())
    }
}

#[async_trait]
impl InferencePort for LlamaInference {
    async fn chat_vs_docs(&self, question: &str, history: &str) -> Result<Judgment> {
        let prompt = prompts::render("chat_vs_docs", context! { question, history })?;
        self.judge("chat_vs_docs", prompt).await
    }

    async fn chat_type(&self, question: &str, history: &str) -> Result<Judgment> {
        let prompt = prompts::render("chat_type", context! { question, history })?;
        self.judge("chat_type", prompt).await
    }

    async fn grade_document(&self, question: &str, document: &str) -> Result<Judgment> {
        let prompt = prompts::render("grade_document", context! { question, document })?;
        self.judge("grade_document", prompt).await
    }

    async fn grade_hallucination(
        &self,
        documents: &str,
        generation: &str,
        history: &str,
    ) -> Result<Judgment> {
        let prompt = prompts::render(
            "grade_hallucination",
            context! { documents, generation, history },
        )?;
        self.judge("grade_hallucination", prompt).await
    }

    async fn grade_answer(&self, question: &str, generation: &str) -> Result<Judgment> {
        let prompt = prompts::render("grade_answer", context! { question, generation })?;
        self.judge("grade_answer", prompt).await
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let prompt = prompts::render("generate", context! { question, context })?;
        self.complete_text("generate", prompt).await
    }

    async fn generate_from_history(&self, question: &str, history: &str) -> Result<String> {
        let prompt = prompts::render("chat_generate", context! { question, history })?;
        self.complete_text("chat_generate", prompt).await
    }

    async fn rewrite_question(
        &self,
        question: &str,
        card_type: &str,
        product_name: &str,
        history: &str,
    ) -> Result<String> {
        let prompt = prompts::render(
            "rewrite",
            context! { question, card_type, product_name, history },
        )?;
        self.complete_text("rewrite", prompt).await
    }
}
