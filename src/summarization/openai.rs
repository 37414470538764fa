use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{
    CompletionClient, CompletionClientError, CompletionRequest, http_client, transport_error,
};

/// Completion client for OpenAI-compatible chat APIs (`POST /v1/chat/completions`).
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompletionClient {
    /// Client targeting `base_url`, sending `api_key` as a bearer token when present.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<String, CompletionClientError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));
        let payload = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });

        let mut builder = self
            .http
            .post(self.endpoint())
            .timeout(request.timeout)
            .json(&payload);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|error| {
            transport_error("OpenAI", &self.base_url, request.timeout, error)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                CompletionClientError::InvalidResponse("chat completion had no choices".into())
            })
    }
}
