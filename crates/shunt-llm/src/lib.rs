//! # shunt LLM
//!
//! Provider adapters for the shunt routing engine.
//!
//! ## Supported backends
//!
//! | Provider | Auth | Notes |
//! |----------|------|-------|
//! | Anthropic | `x-api-key` header | Messages API |
//! | OpenAI | Bearer token | Chat completions |
//! | Azure OpenAI | `api-key` header | Deployment-scoped endpoints |
//! | Mock | none | Scriptable, for tests |
//!
//! Adapters are deliberately thin: one request shape in, one response shape
//! out. Everything interesting — selection, credential rotation, fallback —
//! lives in `shunt-router`, which drives any [`ProviderCaller`].
//!
//! ## Quick start
//!
//! ```rust
//! use shunt_llm::{MockProvider, ProviderCaller, ProviderRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MockProvider::constant("hello");
//!     let response = provider
//!         .complete(
//!             &ProviderRequest::new("hi"),
//!             "test-model",
//!             "key",
//!             &CancellationToken::new(),
//!         )
//!         .await
//!         .unwrap();
//!     assert_eq!(response.content, "hello");
//! }
//! ```

pub mod anthropic;
pub mod azure;
pub mod mock;
pub mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use azure::AzureOpenAIProvider;
pub use mock::{MockCall, MockProvider};
pub use openai::OpenAIProvider;
pub use provider::{
    chunk_completion, ChunkStream, ProviderCaller, ProviderError, ProviderRequest,
    ProviderResponse, ProviderStream, StreamChunk, Usage,
};
