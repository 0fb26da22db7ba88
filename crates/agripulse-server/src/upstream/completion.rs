// SPDX-License-Identifier: Apache-2.0

use super::UpstreamError;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    /// Single-turn completion; returns the model's raw text, trimmed.
    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError>;
}

/// Chat-completions adapter (OpenAI-compatible wire shape).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": request.prompt }],
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }))
            .send()
            .await
            .map_err(|e| UpstreamError(format!("completion call failed: {e}")))?;
        if !response.status().is_success() {
            return Err(UpstreamError(format!(
                "completion endpoint returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("completion parse failed: {e}")))?;
        let text = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError("completion payload missing content".to_string()))?;
        Ok(text.trim().to_string())
    }
}
