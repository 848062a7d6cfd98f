//! # shunt router
//!
//! The runtime routing engine: given a task, pick the best available LLM
//! backend, send the request, and — if that backend fails — transparently
//! retry with a different credential or a different model, without the
//! caller ever seeing a recoverable failure.
//!
//! ## How a request flows
//!
//! 1. **Select** — resolve the primary model from the task type (or the
//!    caller's explicit override) and build the fallback chain.
//! 2. **Validate** — check the candidate's effective context window
//!    against the estimated request size, before touching the network.
//! 3. **Acquire auth** — claim the least-recently-used healthy credential
//!    for the candidate's provider.
//! 4. **Call** — invoke the provider adapter. Failures are classified;
//!    credential-shaped ones rotate to the next key, model-shaped ones
//!    advance the chain. Exhaustion surfaces one aggregated error with the
//!    full attempt history.
//!
//! Streaming follows the same progression, with rotation permitted only
//! until the first content chunk reaches the caller.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shunt_llm::MockProvider;
//! use shunt_router::{Router, RuntimeRequest, TaskType};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder()
//!         .provider("anthropic", Arc::new(MockProvider::constant("hello")))
//!         .credential("anthropic", "sk-ant-key-1")
//!         .build();
//!
//!     let response = router
//!         .execute(&RuntimeRequest::new(TaskType::General, "say hello"))
//!         .await
//!         .unwrap();
//!     assert_eq!(response.content, "hello");
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod guard;
pub mod registry;
pub mod selector;
pub mod tokens;
pub mod types;

pub use auth::{AuthProfile, AuthProfileManager, AuthProfileSnapshot, CooldownConfig};
pub use catalog::{
    Capabilities, CatalogError, Characteristics, ModelCatalog, ModelCatalogEntry, ModelRef, Tier,
};
pub use chain::{
    build_fallback_chain, build_fallback_chain_with_provider_preference, FallbackConfig,
};
pub use classifier::{
    classify, should_fallback, should_mark_auth_failure, should_rotate_credential, FailoverReason,
};
pub use config::RouterConfig;
pub use executor::{Router, RouterBuilder};
pub use guard::{ContextWindowGuard, GuardConfig, Validation};
pub use registry::ProviderRegistry;
pub use selector::{ModelSelector, SelectOptions, TaskPreferences, TaskType};
pub use tokens::TokenEstimator;
pub use types::{FallbackAttempt, RouterError, RuntimeRequest, RuntimeResponse};
