//! Runtime configuration
//!
//! Keys come from the environment or are supplied programmatically. A
//! provider may carry several keys; the auth manager rotates across them.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::chain::FallbackConfig;
use crate::guard::GuardConfig;

/// Engine configuration, static per deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// API keys per provider; more than one enables credential rotation
    pub api_keys: HashMap<String, Vec<String>>,
    /// Azure resource endpoint (required for the azure-openai provider)
    pub azure_endpoint: Option<String>,
    /// Fallback chain configuration
    pub fallback: FallbackConfig,
    /// Context guard thresholds and overrides
    pub guard: GuardConfig,
}

impl RouterConfig {
    /// Load configuration from environment variables.
    ///
    /// Key variables accept a comma-separated list, so one deployment can
    /// rotate across several credentials per provider.
    pub fn from_env() -> Self {
        let mut api_keys = HashMap::new();
        for (provider, variable) in [
            ("anthropic", "ANTHROPIC_API_KEY"),
            ("openai", "OPENAI_API_KEY"),
            ("azure-openai", "AZURE_OPENAI_API_KEY"),
        ] {
            if let Ok(value) = env::var(variable) {
                let keys: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(String::from)
                    .collect();
                if !keys.is_empty() {
                    api_keys.insert(provider.to_string(), keys);
                }
            }
        }

        Self {
            api_keys,
            azure_endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok(),
            fallback: FallbackConfig::default(),
            guard: GuardConfig::default(),
        }
    }

    /// Register an additional API key for a provider
    pub fn add_api_key(&mut self, provider: &str, api_key: &str) {
        self.api_keys
            .entry(provider.to_string())
            .or_default()
            .push(api_key.to_string());
    }

    /// All keys configured for a provider
    pub fn keys_for(&self, provider: &str) -> &[String] {
        self.api_keys
            .get(provider)
            .map(|keys| keys.as_slice())
            .unwrap_or_default()
    }

    /// Check if a provider has at least one key
    pub fn is_configured(&self, provider: &str) -> bool {
        !self.keys_for(provider).is_empty()
    }

    /// List configured providers, sorted for determinism
    pub fn available_providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self
            .api_keys
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(provider, _)| provider.as_str())
            .collect();
        providers.sort_unstable();
        providers
    }
}
