//! Mock LLM provider for testing
//!
//! Scriptable failure rules make this the backend for every failover test:
//! a rule can target one API key (auth rotation scenarios), one model
//! (fallback-chain scenarios), or every call (exhaustion scenarios).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::provider::{
    ProviderCaller, ProviderError, ProviderRequest, ProviderResponse, ProviderStream, StreamChunk,
};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Model the router asked for
    pub model: String,
    /// API key the router supplied
    pub api_key: String,
}

#[derive(Debug, Clone)]
struct FailureRule {
    status: u16,
    message: String,
}

/// A mock provider that returns predefined responses and scripted failures
#[derive(Debug)]
pub struct MockProvider {
    /// Name of this mock (set it to the provider name it stands in for)
    name: String,
    /// Canned responses (cycles through them; empty = echo the prompt)
    responses: Vec<String>,
    /// Current response index
    index: AtomicUsize,
    /// Simulated latency in ms
    latency_ms: u64,
    /// Fail every call
    fail_all: Option<FailureRule>,
    /// Fail calls made with a specific API key
    fail_keys: HashMap<String, FailureRule>,
    /// Fail calls made against a specific model
    fail_models: HashMap<String, FailureRule>,
    /// Every call made, in order
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    /// Create a new mock provider with given responses
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            index: AtomicUsize::new(0),
            latency_ms: 2,
            fail_all: None,
            fail_keys: HashMap::new(),
            fail_models: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock that echoes each prompt back
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// Create a mock that fails every call
    pub fn failing(status: u16, message: &str) -> Self {
        Self::new(Vec::new()).fail_always(status, message)
    }

    /// Stand in for a named provider
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Override the simulated latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Fail every call with the given status and message
    pub fn fail_always(mut self, status: u16, message: &str) -> Self {
        self.fail_all = Some(FailureRule {
            status,
            message: message.to_string(),
        });
        self
    }

    /// Fail any call made with `api_key`
    pub fn fail_for_key(mut self, api_key: &str, status: u16, message: &str) -> Self {
        self.fail_keys.insert(
            api_key.to_string(),
            FailureRule {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Fail any call made against `model`
    pub fn fail_for_model(mut self, model: &str, status: u16, message: &str) -> Self {
        self.fail_models.insert(
            model.to_string(),
            FailureRule {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Record the call and decide its outcome without waiting
    fn outcome(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                model: model.to_string(),
                api_key: api_key.to_string(),
            });
        }

        let rule = self
            .fail_keys
            .get(api_key)
            .or_else(|| self.fail_models.get(model))
            .or(self.fail_all.as_ref());
        if let Some(rule) = rule {
            return Err(ProviderError::Api {
                status: rule.status,
                message: rule.message.clone(),
            });
        }

        if self.responses.is_empty() {
            return Ok(format!("echo: {}", request.prompt));
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        Ok(self.responses[idx % self.responses.len()].clone())
    }
}

#[async_trait]
impl ProviderCaller for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let start = Instant::now();
        let content = self.outcome(request, model, api_key)?;

        tokio::select! {
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            () = tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)) => {}
        }

        Ok(ProviderResponse {
            content,
            model: model.to_string(),
            tokens_used: Some((request.prompt.len() / 4) as u32 + 100),
            latency_ms: start.elapsed().as_millis() as u64,
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn complete_streaming(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> ProviderStream {
        let outcome = self.outcome(request, model, api_key);
        let model = model.to_string();
        let latency_ms = self.latency_ms;
        let cancel = cancel.clone();

        Box::pin(async_stream::stream! {
            tokio::select! {
                () = cancel.cancelled() => {
                    yield Err(ProviderError::Cancelled);
                    return;
                }
                () = tokio::time::sleep(std::time::Duration::from_millis(latency_ms)) => {}
            }

            match outcome {
                Ok(content) => {
                    for piece in content.split_inclusive(' ') {
                        if cancel.is_cancelled() {
                            yield Err(ProviderError::Cancelled);
                            return;
                        }
                        yield Ok(StreamChunk::content(piece, model.clone()));
                    }
                    yield Ok(StreamChunk::Done { model });
                }
                Err(err) => yield Err(err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_constant_response() {
        let mock = MockProvider::constant("Hello, world!");
        let response = mock
            .complete(
                &ProviderRequest::new("test"),
                "test-model",
                "key",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.content, "Hello, world!");
        assert_eq!(response.model, "test-model");
    }

    #[tokio::test]
    async fn test_key_scoped_failure() {
        let mock = MockProvider::echo().fail_for_key("bad-key", 401, "Invalid API key");

        let err = mock
            .complete(
                &ProviderRequest::new("test"),
                "m",
                "bad-key",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));

        let ok = mock
            .complete(
                &ProviderRequest::new("test"),
                "m",
                "good-key",
                &CancellationToken::new(),
            )
            .await;
        assert!(ok.is_ok());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_streaming_matches_sync_content() {
        let sync_mock = MockProvider::constant("alpha beta gamma");
        let stream_mock = MockProvider::constant("alpha beta gamma");
        let request = ProviderRequest::new("test");
        let cancel = CancellationToken::new();

        let sync_content = sync_mock
            .complete(&request, "m", "k", &cancel)
            .await
            .unwrap()
            .content;

        let chunks: Vec<Result<StreamChunk, ProviderError>> = stream_mock
            .complete_streaming(&request, "m", "k", &cancel)
            .collect()
            .await;
        let mut streamed = String::new();
        for chunk in &chunks {
            if let Ok(StreamChunk::Content { text, .. }) = chunk {
                streamed.push_str(text);
            }
        }

        assert_eq!(streamed, sync_content);
        assert!(matches!(chunks.last(), Some(Ok(StreamChunk::Done { .. }))));
    }
}
