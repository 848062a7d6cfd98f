//! Provider trait and common request/response types

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from LLM providers
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// HTTP status code, when the provider returned one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True if this error came from caller-side cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A request to an LLM backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The task prompt
    pub prompt: String,
    /// Supporting context (sent as the system block when non-empty)
    pub context: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
}

impl ProviderRequest {
    /// Create a request with default settings
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            context: String::new(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    /// Create a request carrying supporting context
    pub fn with_context(prompt: &str, context: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            context: context.to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    /// Override the generation budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from one successful backend call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Total tokens used (if reported)
    pub tokens_used: Option<u32>,
    /// Time taken in milliseconds
    pub latency_ms: u64,
    /// Detailed token accounting (if reported)
    pub usage: Option<Usage>,
    /// Why generation stopped (if reported)
    pub finish_reason: Option<String>,
}

/// One unit of a streaming response.
///
/// A stream is a finite, non-restartable sequence: zero or more `Content`
/// chunks followed by exactly one terminal chunk (`Done`, `Error` or
/// `Aborted`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A piece of generated text
    Content { text: String, model: String },
    /// Natural end of the stream
    Done { model: String },
    /// Terminal failure (no more chunks follow)
    Error {
        message: String,
        reason: Option<String>,
    },
    /// The caller cancelled the request
    Aborted,
}

impl StreamChunk {
    /// Create a content chunk
    pub fn content(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Content {
            text: text.into(),
            model: model.into(),
        }
    }

    /// Create a terminal error chunk
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            reason: None,
        }
    }

    /// Check if this chunk terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. } | Self::Aborted)
    }
}

/// Type alias for a boxed async stream of response chunks, as surfaced to
/// callers of the routing engine
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Type alias for a provider-level stream.
///
/// Adapters yield `Ok(Content)` pieces followed by `Ok(Done)`; failures
/// arrive as `Err` carrying the typed [`ProviderError`] so the routing
/// engine can classify them. Adapters never emit the `Error`/`Aborted`
/// chunk variants in-band.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// One pluggable LLM backend.
///
/// The routing engine is agnostic to HTTP/SDK details; anything implementing
/// this trait (Anthropic, OpenAI, Azure OpenAI, or a mock for tests) can be
/// registered. The cancellation token must be honored by in-flight calls.
#[async_trait]
pub trait ProviderCaller: Send + Sync + std::fmt::Debug {
    /// Provider name, e.g. "anthropic"
    fn name(&self) -> &str;

    /// Perform one completion call against `model` using `api_key`
    async fn complete(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Perform one streaming completion call.
    ///
    /// The returned stream owns everything it needs; dropping it abandons
    /// the call.
    fn complete_streaming(
        &self,
        request: &ProviderRequest,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> ProviderStream;
}

/// Adapt a one-shot completion future into a chunked stream.
///
/// Used by adapters that have no vendor streaming wired: the completion runs
/// to the end, then its content is re-emitted as word-level `Content` chunks
/// followed by `Done`. Concatenating the chunks reproduces the completion
/// content exactly. Cancellation is checked before every chunk.
pub fn chunk_completion<F>(completion: F, cancel: CancellationToken) -> ProviderStream
where
    F: std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = completion => result,
        };

        match result {
            Ok(response) => {
                for piece in response.content.split_inclusive(' ') {
                    if cancel.is_cancelled() {
                        yield Err(ProviderError::Cancelled);
                        return;
                    }
                    yield Ok(StreamChunk::content(piece, response.model.clone()));
                }
                yield Ok(StreamChunk::Done {
                    model: response.model,
                });
            }
            Err(err) => yield Err(err),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn response(content: &str) -> ProviderResponse {
        ProviderResponse {
            content: content.to_string(),
            model: "test-model".to_string(),
            tokens_used: Some(12),
            latency_ms: 1,
            usage: None,
            finish_reason: Some("stop".to_string()),
        }
    }

    #[test]
    fn test_chunk_serialization_is_tagged() {
        let chunk = StreamChunk::content("hi", "test-model");
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"type\":\"content\""));
    }

    #[test]
    fn test_terminal_chunks() {
        assert!(!StreamChunk::content("hi", "m").is_terminal());
        assert!(StreamChunk::Done {
            model: "m".to_string()
        }
        .is_terminal());
        assert!(StreamChunk::error("boom").is_terminal());
        assert!(StreamChunk::Aborted.is_terminal());
    }

    #[tokio::test]
    async fn test_chunk_completion_reassembles_content() {
        let content = "the quick brown fox";
        let stream = chunk_completion(
            async move { Ok(response("the quick brown fox")) },
            CancellationToken::new(),
        );
        let chunks: Vec<Result<StreamChunk, ProviderError>> = stream.collect().await;

        let mut text = String::new();
        for chunk in &chunks {
            if let Ok(StreamChunk::Content { text: piece, .. }) = chunk {
                text.push_str(piece);
            }
        }
        assert_eq!(text, content);
        assert!(matches!(chunks.last(), Some(Ok(StreamChunk::Done { .. }))));
    }

    #[tokio::test]
    async fn test_chunk_completion_error_carries_status() {
        let stream = chunk_completion(
            async move {
                Err::<ProviderResponse, _>(ProviderError::Api {
                    status: 503,
                    message: "service unavailable".to_string(),
                })
            },
            CancellationToken::new(),
        );
        let chunks: Vec<Result<StreamChunk, ProviderError>> = stream.collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Err(err) if err.status() == Some(503)));
    }

    #[tokio::test]
    async fn test_chunk_completion_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = chunk_completion(async move { Ok(response("never seen")) }, cancel);
        let chunks: Vec<Result<StreamChunk, ProviderError>> = stream.collect().await;
        assert!(matches!(chunks.as_slice(), [Err(ProviderError::Cancelled)]));
    }
}
