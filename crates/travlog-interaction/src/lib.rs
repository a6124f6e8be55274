//! LLM backend integration for the Travlog assistant.
//!
//! Implements [`travlog_core::ports::InferencePort`] over an
//! OpenAI-compatible chat-completions endpoint, with one minijinja prompt
//! template per grading/generation capability.

mod client;
mod inference;
pub mod prompts;

pub use client::LlamaClient;
pub use inference::LlamaInference;
