use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{
    CompletionClient, CompletionClientError, CompletionRequest, http_client, transport_error,
};

/// Completion client for a local Ollama runtime (`POST /api/generate`).
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OllamaCompletionClient {
    /// Client targeting `base_url`, sending `api_key` as a bearer token when present.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default = "default_done")]
    done: bool,
}

fn default_done() -> bool {
    true
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<String, CompletionClientError> {
        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "num_predict": request.max_tokens,
            }
        });
        if let Some(system) = request.system_prompt.as_deref() {
            payload["system"] = json!(system);
        }

        let mut builder = self
            .http
            .post(self.endpoint())
            .timeout(request.timeout)
            .json(&payload);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|error| {
            transport_error("Ollama", &self.base_url, request.timeout, error)
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CompletionClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(CompletionClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
