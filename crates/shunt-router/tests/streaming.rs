//! Streaming executor behavior: chunk discipline, rotation barrier,
//! cancellation

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use shunt_llm::{
    MockProvider, ProviderCaller, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream, StreamChunk,
};
use shunt_router::{AuthProfile, ModelRef, Router, RuntimeRequest, TaskType};

fn content_of(chunks: &[StreamChunk]) -> String {
    chunks
        .iter()
        .filter_map(|chunk| match chunk {
            StreamChunk::Content { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn streamed_content_matches_synchronous_content() {
    let mock = Arc::new(MockProvider::constant("alpha beta gamma"));
    let router = Router::builder()
        .provider("anthropic", Arc::clone(&mock) as Arc<dyn ProviderCaller>)
        .credential("anthropic", "key-1")
        .build();
    let request = RuntimeRequest::new(TaskType::General, "hi");

    let sync_content = router.execute(&request).await.unwrap().content;

    let chunks: Vec<StreamChunk> = router
        .execute_streaming(&request, &CancellationToken::new())
        .collect()
        .await;

    assert_eq!(content_of(&chunks), sync_content);
    let done_count = chunks
        .iter()
        .filter(|chunk| matches!(chunk, StreamChunk::Done { .. }))
        .count();
    assert_eq!(done_count, 1);
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
}

#[tokio::test]
async fn streaming_rotates_credentials_before_first_chunk() {
    let mock = Arc::new(
        MockProvider::constant("recovered output").fail_for_key(
            "key-1",
            401,
            "Invalid API key provided",
        ),
    );
    let router = Router::builder()
        .provider("anthropic", Arc::clone(&mock) as Arc<dyn ProviderCaller>)
        .build();

    let failing = AuthProfile::new("anthropic", "key-1");
    let failing_id = failing.id.clone();
    router.auth().add(failing).await;
    let mut healthy = AuthProfile::new("anthropic", "key-2");
    healthy.last_used = Some(Instant::now());
    router.auth().add(healthy).await;

    let request = RuntimeRequest::new(TaskType::General, "hi");
    let chunks: Vec<StreamChunk> = router
        .execute_streaming(&request, &CancellationToken::new())
        .collect()
        .await;

    assert_eq!(content_of(&chunks), "recovered output");
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
    assert_eq!(mock.calls().len(), 2);

    let snapshot = router.auth().snapshot_profile(&failing_id).await.unwrap();
    assert!(snapshot.in_cooldown);
}

/// Yields one content chunk, then fails. Exercises the rule that nothing is
/// retried once partial output has reached the caller.
#[derive(Debug)]
struct MidStreamFailure;

#[async_trait]
impl ProviderCaller for MidStreamFailure {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        _request: &ProviderRequest,
        model: &str,
        _api_key: &str,
        _cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            content: "unused".to_string(),
            model: model.to_string(),
            tokens_used: None,
            latency_ms: 0,
            usage: None,
            finish_reason: None,
        })
    }

    fn complete_streaming(
        &self,
        _request: &ProviderRequest,
        model: &str,
        _api_key: &str,
        _cancel: &CancellationToken,
    ) -> ProviderStream {
        let model = model.to_string();
        Box::pin(async_stream::stream! {
            yield Ok(StreamChunk::content("partial ", model.clone()));
            yield Err(ProviderError::Api {
                status: 503,
                message: "connection reset by peer".to_string(),
            });
        })
    }
}

#[tokio::test]
async fn no_retry_after_first_content_chunk() {
    let fallback_mock = Arc::new(MockProvider::constant("should never run"));
    let router = Router::builder()
        .fallbacks(vec![ModelRef::new("openai", "gpt-4-turbo")])
        .provider("anthropic", Arc::new(MidStreamFailure))
        .provider("openai", Arc::clone(&fallback_mock) as Arc<dyn ProviderCaller>)
        .credential("anthropic", "key-1")
        .credential("anthropic", "key-2")
        .credential("openai", "key-3")
        .build();

    let request = RuntimeRequest::new(TaskType::General, "hi");
    let chunks: Vec<StreamChunk> = router
        .execute_streaming(&request, &CancellationToken::new())
        .collect()
        .await;

    // one piece of partial output, then a single terminal error
    assert_eq!(content_of(&chunks), "partial ");
    assert_eq!(chunks.len(), 2);
    assert!(matches!(
        chunks.last(),
        Some(StreamChunk::Error { reason: Some(reason), .. }) if reason == "unavailable"
    ));

    // neither the second credential nor the fallback model was tried
    assert_eq!(fallback_mock.call_count(), 0);
}

#[tokio::test]
async fn cancellation_mid_stream_emits_aborted() {
    let mock = Arc::new(MockProvider::constant("one two three four"));
    let router = Router::builder()
        .provider("anthropic", Arc::clone(&mock) as Arc<dyn ProviderCaller>)
        .credential("anthropic", "key-1")
        .build();

    let request = RuntimeRequest::new(TaskType::General, "hi");
    let cancel = CancellationToken::new();
    let mut stream = router.execute_streaming(&request, &cancel);

    let first = stream.next().await.unwrap();
    assert!(matches!(first, StreamChunk::Content { .. }));

    cancel.cancel();
    let mut tail = Vec::new();
    while let Some(chunk) = stream.next().await {
        tail.push(chunk);
    }

    assert!(matches!(tail.last(), Some(StreamChunk::Aborted)));
    assert!(!tail
        .iter()
        .any(|chunk| matches!(chunk, StreamChunk::Done { .. })));
}

#[tokio::test]
async fn streaming_exhaustion_is_one_terminal_error() {
    let mock = Arc::new(MockProvider::failing(503, "service unavailable"));
    let router = Router::builder()
        .provider("anthropic", Arc::clone(&mock) as Arc<dyn ProviderCaller>)
        .credential("anthropic", "key-1")
        .build();

    let request = RuntimeRequest::new(TaskType::General, "hi");
    let chunks: Vec<StreamChunk> = router
        .execute_streaming(&request, &CancellationToken::new())
        .collect()
        .await;

    assert_eq!(chunks.len(), 1);
    assert!(matches!(
        &chunks[0],
        StreamChunk::Error { message, reason: Some(reason) }
            if message.contains("fallback candidates failed") && reason == "unavailable"
    ));
}
