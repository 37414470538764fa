//! Abstractions for generating summaries via LLM completion providers.
//!
//! Summarization is optional; when no provider is configured the processing layer only chunks.
//! Both adapters issue HTTP requests directly to their runtime: Ollama's `/api/generate` and
//! OpenAI-compatible `/v1/chat/completions`.

mod ollama;
mod openai;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{CompletionProvider, Config};

pub use ollama::OllamaCompletionClient;
pub use openai::OpenAiCompletionClient;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors surfaced by a single completion call.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The call did not finish within its time limit.
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Request payload passed to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully rendered user prompt.
    pub prompt: String,
    /// Model identifier understood by the provider.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: usize,
    /// Per-call time limit.
    pub timeout: Duration,
    /// Optional system instruction.
    pub system_prompt: Option<String>,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for the request; any failure is reported as an error.
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<String, CompletionClientError>;
}

/// Build a completion client based on configuration; `None` when summarization is disabled.
pub fn build_completion_client(config: &Config) -> Option<Arc<dyn CompletionClient>> {
    match config.completion_provider {
        CompletionProvider::None => None,
        CompletionProvider::Ollama => {
            let base_url = config
                .completion_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Some(Arc::new(OllamaCompletionClient::new(
                base_url,
                config.completion_api_key.clone(),
            )))
        }
        CompletionProvider::OpenAI => {
            let base_url = config
                .completion_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Some(Arc::new(OpenAiCompletionClient::new(
                base_url,
                config.completion_api_key.clone(),
            )))
        }
    }
}

fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("semcell/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to construct reqwest::Client for completions")
}

fn transport_error(
    provider: &str,
    base_url: &str,
    timeout: Duration,
    error: reqwest::Error,
) -> CompletionClientError {
    if error.is_timeout() {
        CompletionClientError::Timeout(timeout)
    } else {
        CompletionClientError::ProviderUnavailable(format!(
            "failed to reach {provider} at {base_url}: {error}"
        ))
    }
}
