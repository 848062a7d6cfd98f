//! Runtime executor — the failover state machine
//!
//! Each request walks SELECT → VALIDATE → ACQUIRE_AUTH → CALL; a failed
//! call is classified and becomes either a credential rotation (same
//! model, next key) or an advance to the next model in the fallback
//! chain. Provider failures never propagate raw: callers see a response,
//! one aggregated `FallbackExhausted` error, or an abort.
//!
//! The streaming twin follows the same progression with one extra rule:
//! fallback and rotation are only permitted while zero content chunks
//! have been emitted. Partial output cannot be un-sent, so any later
//! failure is surfaced as a single terminal error chunk.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shunt_llm::{ProviderCaller, ProviderError, ProviderRequest, StreamChunk};

use crate::auth::{AuthProfile, AuthProfileManager, CooldownConfig};
use crate::catalog::{ModelCatalog, ModelRef};
use crate::chain::{build_fallback_chain, FallbackConfig};
use crate::classifier::{
    classify, should_mark_auth_failure, should_rotate_credential, FailoverReason,
};
use crate::config::RouterConfig;
use crate::guard::{ContextWindowGuard, GuardConfig};
use crate::registry::ProviderRegistry;
use crate::selector::{ModelSelector, SelectOptions, TaskPreferences};
use crate::types::{FallbackAttempt, RouterError, RuntimeRequest, RuntimeResponse};

/// The runtime routing engine.
///
/// One instance serves many concurrent requests; the credential table is
/// the only shared mutable state and lives behind the auth manager's lock.
#[derive(Debug)]
pub struct Router {
    catalog: ModelCatalog,
    selector: ModelSelector,
    guard: ContextWindowGuard,
    fallback: FallbackConfig,
    auth: AuthProfileManager,
    registry: ProviderRegistry,
}

impl Router {
    /// Start building a router
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Build a fully wired router from configuration: one adapter and one
    /// auth profile per configured API key.
    pub fn from_config(config: RouterConfig) -> Self {
        let registry = ProviderRegistry::from_config(&config);
        let mut profiles = Vec::new();
        for (provider, keys) in &config.api_keys {
            for key in keys {
                profiles.push(AuthProfile::new(provider, key));
            }
        }
        Self {
            catalog: ModelCatalog::builtin().clone(),
            selector: ModelSelector::default(),
            guard: ContextWindowGuard::new(config.guard),
            fallback: config.fallback,
            auth: AuthProfileManager::with_profiles(profiles, CooldownConfig::default()),
            registry,
        }
    }

    /// The credential pool
    pub fn auth(&self) -> &AuthProfileManager {
        &self.auth
    }

    /// The model catalog in use
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// The fallback chain this router would try for a request (SELECT)
    pub fn plan(&self, request: &RuntimeRequest) -> Vec<ModelRef> {
        let options = SelectOptions {
            force_model: request.model.clone(),
        };
        let primary = self.selector.select(request.task_type, &options);
        build_fallback_chain(&primary, &self.fallback)
    }

    fn provider_request(request: &RuntimeRequest) -> ProviderRequest {
        let mut provider_request =
            ProviderRequest::with_context(&request.prompt, &request.context);
        if let Some(max_tokens) = request.max_tokens {
            provider_request.max_tokens = max_tokens;
        }
        provider_request
    }

    /// VALIDATE plus adapter lookup. Returns the adapter, or records one
    /// model-level attempt and yields `None` so the chain advances without
    /// touching the network.
    fn admit_candidate(
        &self,
        request: &RuntimeRequest,
        candidate: &ModelRef,
        attempts: &mut Vec<FallbackAttempt>,
    ) -> Option<Arc<dyn ProviderCaller>> {
        let validation = self.guard.validate(request, candidate, &self.catalog);
        for warning in &validation.warnings {
            warn!(model = %candidate, "{warning}");
        }
        if !validation.is_valid {
            let error = validation.errors.join("; ");
            debug!(model = %candidate, error = %error, "candidate rejected by context guard");
            attempts.push(FallbackAttempt {
                provider: candidate.provider.clone(),
                model: candidate.model.clone(),
                error,
                reason: FailoverReason::Context,
            });
            return None;
        }

        let Some(provider) = self.registry.get(&candidate.provider) else {
            attempts.push(FallbackAttempt {
                provider: candidate.provider.clone(),
                model: candidate.model.clone(),
                error: format!("no provider registered for {}", candidate.provider),
                reason: FailoverReason::Unavailable,
            });
            return None;
        };
        Some(provider)
    }

    fn no_credential_attempt(candidate: &ModelRef) -> FallbackAttempt {
        FallbackAttempt {
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            error: format!(
                "no credential available for {} (all cooling down)",
                candidate.provider
            ),
            reason: FailoverReason::Auth,
        }
    }

    /// Execute a request to completion
    pub async fn execute(&self, request: &RuntimeRequest) -> Result<RuntimeResponse, RouterError> {
        self.execute_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Execute a request, honoring a cancellation signal.
    ///
    /// The signal is checked before each credential acquisition and passed
    /// into the provider call; after cancellation no credential state is
    /// mutated.
    pub async fn execute_with_cancel(
        &self,
        request: &RuntimeRequest,
        cancel: &CancellationToken,
    ) -> Result<RuntimeResponse, RouterError> {
        let chain = self.plan(request);
        let provider_request = Self::provider_request(request);
        let mut attempts: Vec<FallbackAttempt> = Vec::new();

        for candidate in &chain {
            let Some(provider) = self.admit_candidate(request, candidate, &mut attempts) else {
                continue;
            };

            loop {
                if cancel.is_cancelled() {
                    return Err(RouterError::Aborted);
                }
                let Some(profile) =
                    self.auth.get_available_profile(&candidate.provider).await
                else {
                    attempts.push(Self::no_credential_attempt(candidate));
                    break;
                };

                debug!(
                    provider = %candidate.provider,
                    model = %candidate.model,
                    profile = %profile.id,
                    "calling provider"
                );
                match provider
                    .complete(&provider_request, &candidate.model, &profile.api_key, cancel)
                    .await
                {
                    Ok(response) => {
                        self.auth.mark_success(&profile.id).await;
                        info!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            latency_ms = response.latency_ms,
                            failed_attempts = attempts.len(),
                            "request served"
                        );
                        return Ok(RuntimeResponse {
                            content: response.content,
                            model: candidate.clone(),
                            tokens_used: response.tokens_used,
                            latency_ms: response.latency_ms,
                            usage: response.usage,
                            finish_reason: response.finish_reason,
                        });
                    }
                    Err(error) if error.is_cancelled() => return Err(RouterError::Aborted),
                    Err(error) => {
                        let reason = classify(&error);
                        warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            reason = %reason,
                            error = %error,
                            "provider call failed"
                        );
                        attempts.push(FallbackAttempt {
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            error: error.to_string(),
                            reason,
                        });
                        if should_mark_auth_failure(reason) {
                            self.auth.mark_failure(&profile.id).await;
                        }
                        if should_rotate_credential(reason)
                            && self.auth.has_available(&candidate.provider).await
                        {
                            debug!(provider = %candidate.provider, "rotating credential");
                            continue;
                        }
                        break;
                    }
                }
            }
        }

        warn!(attempts = attempts.len(), "fallback chain exhausted");
        Err(RouterError::FallbackExhausted { attempts })
    }

    /// Execute a request as a stream of chunks.
    ///
    /// The sequence is finite and non-restartable: zero or more `Content`
    /// chunks, then exactly one terminal chunk. Rotation and fallback only
    /// happen while nothing has been emitted yet.
    pub fn execute_streaming<'router>(
        &'router self,
        request: &RuntimeRequest,
        cancel: &CancellationToken,
    ) -> Pin<Box<dyn Stream<Item = StreamChunk> + Send + 'router>> {
        let request = request.clone();
        let cancel = cancel.clone();

        Box::pin(async_stream::stream! {
            let chain = self.plan(&request);
            let provider_request = Self::provider_request(&request);
            let mut attempts: Vec<FallbackAttempt> = Vec::new();

            'chain: for candidate in &chain {
                let Some(provider) = self.admit_candidate(&request, candidate, &mut attempts)
                else {
                    continue 'chain;
                };

                'rotate: loop {
                    if cancel.is_cancelled() {
                        yield StreamChunk::Aborted;
                        return;
                    }
                    let Some(profile) =
                        self.auth.get_available_profile(&candidate.provider).await
                    else {
                        attempts.push(Self::no_credential_attempt(candidate));
                        break 'rotate;
                    };

                    debug!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        profile = %profile.id,
                        "starting provider stream"
                    );
                    let mut stream = provider.complete_streaming(
                        &provider_request,
                        &candidate.model,
                        &profile.api_key,
                        &cancel,
                    );

                    let mut emitted = false;
                    let mut failure: Option<ProviderError> = None;
                    loop {
                        if cancel.is_cancelled() {
                            yield StreamChunk::Aborted;
                            return;
                        }
                        match stream.next().await {
                            Some(Ok(StreamChunk::Content { text, model })) => {
                                emitted = true;
                                yield StreamChunk::Content { text, model };
                            }
                            Some(Ok(StreamChunk::Done { model })) => {
                                self.auth.mark_success(&profile.id).await;
                                info!(
                                    provider = %candidate.provider,
                                    model = %candidate.model,
                                    "stream completed"
                                );
                                yield StreamChunk::Done { model };
                                return;
                            }
                            Some(Ok(StreamChunk::Aborted)) => {
                                yield StreamChunk::Aborted;
                                return;
                            }
                            Some(Ok(StreamChunk::Error { message, .. })) => {
                                failure = Some(ProviderError::Other(message));
                                break;
                            }
                            Some(Err(error)) if error.is_cancelled() => {
                                yield StreamChunk::Aborted;
                                return;
                            }
                            Some(Err(error)) => {
                                failure = Some(error);
                                break;
                            }
                            None => break,
                        }
                    }

                    let error = failure.unwrap_or_else(|| {
                        ProviderError::Other("stream ended without completion".to_string())
                    });
                    let reason = classify(&error);
                    warn!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        reason = %reason,
                        error = %error,
                        emitted,
                        "streaming call failed"
                    );
                    if should_mark_auth_failure(reason) {
                        self.auth.mark_failure(&profile.id).await;
                    }
                    if emitted {
                        // partial output already reached the caller; nothing
                        // can be retried safely
                        yield StreamChunk::Error {
                            message: error.to_string(),
                            reason: Some(reason.to_string()),
                        };
                        return;
                    }
                    attempts.push(FallbackAttempt {
                        provider: candidate.provider.clone(),
                        model: candidate.model.clone(),
                        error: error.to_string(),
                        reason,
                    });
                    if should_rotate_credential(reason)
                        && self.auth.has_available(&candidate.provider).await
                    {
                        debug!(provider = %candidate.provider, "rotating credential");
                        continue 'rotate;
                    }
                    break 'rotate;
                }
            }

            warn!(attempts = attempts.len(), "fallback chain exhausted");
            let reason = attempts.last().map(|attempt| attempt.reason.to_string());
            yield StreamChunk::Error {
                message: format!(
                    "all fallback candidates failed after {} attempts",
                    attempts.len()
                ),
                reason,
            };
        })
    }
}

/// Builder for [`Router`]
#[derive(Debug)]
pub struct RouterBuilder {
    catalog: ModelCatalog,
    preferences: TaskPreferences,
    guard: GuardConfig,
    fallback: FallbackConfig,
    registry: ProviderRegistry,
    cooldown: CooldownConfig,
    profiles: Vec<AuthProfile>,
}

impl RouterBuilder {
    /// Builder with built-in catalog and preferences, no providers
    pub fn new() -> Self {
        Self {
            catalog: ModelCatalog::builtin().clone(),
            preferences: TaskPreferences::with_defaults(),
            guard: GuardConfig::default(),
            fallback: FallbackConfig::default(),
            registry: ProviderRegistry::new(),
            cooldown: CooldownConfig::default(),
            profiles: Vec::new(),
        }
    }

    /// Replace the model catalog
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the task preference table
    pub fn preferences(mut self, preferences: TaskPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Replace the guard configuration
    pub fn guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    /// Set the fallback models tried after the primary
    pub fn fallbacks(mut self, fallbacks: Vec<ModelRef>) -> Self {
        self.fallback = FallbackConfig::new(fallbacks);
        self
    }

    /// Register a provider adapter
    pub fn provider(mut self, name: &str, provider: Arc<dyn ProviderCaller>) -> Self {
        self.registry.register(name, provider);
        self
    }

    /// Register a credential for a provider
    pub fn credential(mut self, provider: &str, api_key: &str) -> Self {
        self.profiles.push(AuthProfile::new(provider, api_key));
        self
    }

    /// Replace the cooldown backoff settings
    pub fn cooldown(mut self, cooldown: CooldownConfig) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Build the router
    pub fn build(self) -> Router {
        Router {
            catalog: self.catalog,
            selector: ModelSelector::new(self.preferences),
            guard: ContextWindowGuard::new(self.guard),
            fallback: self.fallback,
            auth: AuthProfileManager::with_profiles(self.profiles, self.cooldown),
            registry: self.registry,
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::TaskType;
    use shunt_llm::MockProvider;

    #[test]
    fn test_plan_uses_forced_model_as_primary() {
        let router = Router::builder()
            .fallbacks(vec![ModelRef::new("openai", "gpt-4-turbo")])
            .build();
        let request = RuntimeRequest::new(TaskType::General, "hi")
            .with_model(ModelRef::new("anthropic", "claude-haiku-3.5"));

        let chain = router.plan(&request);
        assert_eq!(chain[0], ModelRef::new("anthropic", "claude-haiku-3.5"));
        assert_eq!(chain[1], ModelRef::new("openai", "gpt-4-turbo"));
    }

    #[tokio::test]
    async fn test_guard_rejection_advances_without_calling_network() {
        let mock = Arc::new(MockProvider::constant("served by fallback"));
        let primary = ModelRef::new("anthropic", "claude-sonnet-4");
        let fallback = ModelRef::new("anthropic", "claude-haiku-3.5");

        // primary window forced below the hard minimum; fallback untouched
        let router = Router::builder()
            .guard(GuardConfig::default().with_override(&primary, 4_000))
            .fallbacks(vec![fallback.clone()])
            .provider("anthropic", Arc::clone(&mock) as Arc<dyn ProviderCaller>)
            .credential("anthropic", "key-1")
            .build();

        let request = RuntimeRequest::new(TaskType::General, "hi");
        let response = router.execute(&request).await.unwrap();

        assert_eq!(response.model, fallback);
        // the rejected primary never reached the adapter
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].model, "claude-haiku-3.5");
    }

    #[tokio::test]
    async fn test_missing_provider_is_recorded_and_skipped() {
        let router = Router::builder().credential("anthropic", "key-1").build();
        let request = RuntimeRequest::new(TaskType::General, "hi");

        let err = router.execute(&request).await.unwrap_err();
        let attempts = err.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].error.contains("no provider registered"));
        assert_eq!(attempts[0].reason, FailoverReason::Unavailable);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts() {
        let router = Router::builder()
            .provider("anthropic", Arc::new(MockProvider::constant("unused")))
            .credential("anthropic", "key-1")
            .build();
        let request = RuntimeRequest::new(TaskType::General, "hi");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = router.execute_with_cancel(&request, &cancel).await.unwrap_err();
        assert!(matches!(err, RouterError::Aborted));
    }
}
