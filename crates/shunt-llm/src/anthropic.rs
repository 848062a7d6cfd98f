//! Anthropic LLM provider

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::provider::{
    chunk_completion, ProviderCaller, ProviderError, ProviderRequest,
    ProviderResponse, ProviderStream, Usage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API request format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic provider
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    /// Create with a custom base URL (proxies, test servers)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderCaller for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/v1/messages", self.base_url);

        let body = AnthropicRequest {
            model: model.to_string(),
            max_tokens: request.max_tokens,
            system: (!request.context.is_empty()).then(|| request.context.clone()),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let send = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = send => result.map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, model, "anthropic request failed");
            return Err(ProviderError::Api { status, message });
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content: String = api_response
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(ProviderResponse {
            content,
            model: api_response.model,
            tokens_used: usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
            usage,
            finish_reason: api_response.stop_reason,
        })
    }

    fn complete_streaming(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> ProviderStream {
        let provider = self.clone();
        let request = request.clone();
        let model = model.to_string();
        let api_key = api_key.to_string();
        let token = cancel.clone();
        chunk_completion(
            async move {
                provider
                    .complete(&request, &model, &api_key, &token)
                    .await
            },
            cancel.clone(),
        )
    }
}
