//! Provider registry
//!
//! Adapters are instantiated once and reused for every request. Tests
//! inject mocks through the same interface.

use std::collections::HashMap;
use std::sync::Arc;

use shunt_llm::{AnthropicProvider, AzureOpenAIProvider, OpenAIProvider, ProviderCaller};

use crate::config::RouterConfig;

/// Maps provider names to caller instances
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderCaller>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration: one adapter per provider with
    /// at least one API key (Azure additionally needs its endpoint).
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut registry = Self::new();
        if config.is_configured("anthropic") {
            registry.register("anthropic", Arc::new(AnthropicProvider::new()));
        }
        if config.is_configured("openai") {
            registry.register("openai", Arc::new(OpenAIProvider::new()));
        }
        if config.is_configured("azure-openai") {
            if let Some(endpoint) = &config.azure_endpoint {
                registry.register("azure-openai", Arc::new(AzureOpenAIProvider::new(endpoint)));
            }
        }
        registry
    }

    /// Register (or replace) the adapter for a provider name
    pub fn register(&mut self, name: &str, provider: Arc<dyn ProviderCaller>) {
        self.providers.insert(name.to_string(), provider);
    }

    /// Builder-style registration
    pub fn with_provider(mut self, name: &str, provider: Arc<dyn ProviderCaller>) -> Self {
        self.register(name, provider);
        self
    }

    /// The adapter for a provider name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderCaller>> {
        self.providers.get(name).cloned()
    }

    /// Check if a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted for determinism
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
