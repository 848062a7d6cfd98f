//! Azure OpenAI LLM provider
//!
//! Azure serves the OpenAI chat-completion shape from deployment-scoped
//! endpoints: `{endpoint}/openai/deployments/{deployment}/chat/completions`.
//! The model name the router selects is used as the deployment name.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::provider::{
    chunk_completion, ProviderCaller, ProviderError, ProviderRequest,
    ProviderResponse, ProviderStream, Usage,
};

const DEFAULT_API_VERSION: &str = "2024-02-01";

#[derive(Debug, Serialize)]
struct AzureRequest {
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AzureResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<AzureUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct AzureUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Azure OpenAI provider
#[derive(Debug, Clone)]
pub struct AzureOpenAIProvider {
    /// HTTP client
    client: reqwest::Client,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    endpoint: String,
    /// API version query parameter
    api_version: String,
}

impl AzureOpenAIProvider {
    /// Create a provider for the given resource endpoint
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Override the API version
    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }
}

#[async_trait]
impl ProviderCaller for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let start = Instant::now();
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, model, self.api_version
        );

        let mut messages = Vec::with_capacity(2);
        if !request.context.is_empty() {
            messages.push(Message {
                role: "system".to_string(),
                content: request.context.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let body = AzureRequest {
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let send = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = send => result.map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, deployment = model, "azure openai request failed");
            return Err(ProviderError::Api { status, message });
        }

        let api_response: AzureResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let (content, finish_reason) = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| (c.message.content, c.finish_reason))
            .unwrap_or_default();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            content,
            model: api_response.model.unwrap_or_else(|| model.to_string()),
            tokens_used: usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
            usage,
            finish_reason,
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
