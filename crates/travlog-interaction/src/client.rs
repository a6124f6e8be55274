//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! The reference deployment serves a local Llama model through llama.cpp's
//! OpenAI-compatible server; any endpoint speaking the same protocol works.
//! Configuration priority: explicit constructor arguments > environment
//! variables.

use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use travlog_core::{Result, TravlogError};

const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1/chat/completions";
const DEFAULT_MODEL: &str = "meta-llama-3.1-8b-instruct";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Chat-completions client backing every grading and generation call.
#[derive(Clone)]
pub struct LlamaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlamaClient {
    /// Creates a client for the given endpoint and model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| TravlogError::config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// - `TRAVLOG_LLM_URL`: chat-completions endpoint (default local llama.cpp)
    /// - `TRAVLOG_LLM_MODEL`: model name
    /// - `TRAVLOG_LLM_API_KEY`: optional bearer token
    pub fn try_from_env() -> Result<Self> {
        let base_url = env::var("TRAVLOG_LLM_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("TRAVLOG_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let mut client = Self::new(base_url, model)?;
        if let Ok(api_key) = env::var("TRAVLOG_LLM_API_KEY") {
            client.api_key = Some(api_key);
        }
        Ok(client)
    }

    /// Overrides the sampling settings after construction.
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Sends one prompt and returns the completion text.
    ///
    /// `capability` names the grading/generation capability making the call
    /// and is carried into the error for log context.
    pub async fn complete(&self, capability: &'static str, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.base_url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.send().await.map_err(|err| {
            let reason = if err.is_timeout() {
                "request timed out"
            } else if err.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            TravlogError::port(capability, format!("{reason}: {err}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(capability, status, body, retry_after));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            TravlogError::port(capability, format!("failed to parse response: {err}"))
        })?;

        extract_text_response(capability, parsed)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(
    capability: &'static str,
    response: ChatCompletionResponse,
) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| TravlogError::port(capability, "backend returned no content"))
}

fn map_http_error(
    capability: &'static str,
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
) -> TravlogError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let mut detail = format!("HTTP {status}: {message}");
    if let Some(delay) = retry_after {
        detail.push_str(&format!(" (retry after {}s)", delay.as_secs()));
    }
    TravlogError::port(capability, detail)
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    // Retry-After HTTP-date form is not handled, only the seconds form.
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_seconds() {
        let header = HeaderValue::from_static("30");
        assert_eq!(
            parse_retry_after(Some(&header)),
            Some(Duration::from_secs(30))
        );
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_map_http_error_prefers_structured_message() {
        let err = map_http_error(
            "generate",
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "slow down"}}"#.to_string(),
            Some(Duration::from_secs(5)),
        );

        assert!(err.is_port());
        assert!(err.to_string().contains("slow down"));
        assert!(err.to_string().contains("retry after 5s"));
    }
}
