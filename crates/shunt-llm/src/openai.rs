//! OpenAI LLM provider

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::provider::{
    chunk_completion, ProviderCaller, ProviderError, ProviderRequest,
    ProviderResponse, ProviderStream, Usage,
};

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<OpenAIUsage>,
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
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com".to_string(),
        }
    }

    /// Create with a custom base URL (proxies, test servers)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_messages(request: &ProviderRequest) -> Vec<Message> {
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
        messages
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderCaller for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAIRequest {
            model: model.to_string(),
            messages: Self::build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let send = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = send => result.map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, model, "openai request failed");
            return Err(ProviderError::Api { status, message });
        }

        let api_response: OpenAIResponse = response
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
            model: api_response.model,
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
