//! Fallback chain construction
//!
//! A chain is computed once per request and immutable thereafter.

use serde::{Deserialize, Serialize};

use crate::catalog::ModelRef;

/// Caller-supplied fallback configuration, static per deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Models to try, in order, after the primary
    pub explicit_fallbacks: Vec<ModelRef>,
}

impl FallbackConfig {
    /// Configuration with the given fallback models
    pub fn new(explicit_fallbacks: Vec<ModelRef>) -> Self {
        Self { explicit_fallbacks }
    }
}

/// `[primary] ++ explicit fallbacks`, deduplicated, order preserved
pub fn build_fallback_chain(primary: &ModelRef, config: &FallbackConfig) -> Vec<ModelRef> {
    let mut chain = Vec::with_capacity(1 + config.explicit_fallbacks.len());
    chain.push(primary.clone());
    for candidate in &config.explicit_fallbacks {
        if !chain.contains(candidate) {
            chain.push(candidate.clone());
        }
    }
    chain
}

/// Same chain, with `provider`'s models stably moved to the front
pub fn build_fallback_chain_with_provider_preference(
    primary: &ModelRef,
    config: &FallbackConfig,
    provider: &str,
) -> Vec<ModelRef> {
    let (mut preferred, rest): (Vec<ModelRef>, Vec<ModelRef>) = build_fallback_chain(primary, config)
        .into_iter()
        .partition(|candidate| candidate.provider == provider);
    preferred.extend(rest);
    preferred
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sonnet() -> ModelRef {
        ModelRef::new("anthropic", "claude-sonnet-4")
    }

    fn haiku() -> ModelRef {
        ModelRef::new("anthropic", "claude-haiku-3.5")
    }

    fn gpt4_turbo() -> ModelRef {
        ModelRef::new("openai", "gpt-4-turbo")
    }

    #[test]
    fn test_primary_leads_the_chain() {
        let config = FallbackConfig::new(vec![haiku(), gpt4_turbo()]);
        let chain = build_fallback_chain(&sonnet(), &config);
        assert_eq!(chain, vec![sonnet(), haiku(), gpt4_turbo()]);
    }

    #[test]
    fn test_duplicates_are_dropped_preserving_order() {
        let config = FallbackConfig::new(vec![sonnet(), haiku(), haiku(), gpt4_turbo()]);
        let chain = build_fallback_chain(&sonnet(), &config);
        assert_eq!(chain, vec![sonnet(), haiku(), gpt4_turbo()]);
    }

    #[test]
    fn test_empty_config_yields_primary_only() {
        let chain = build_fallback_chain(&sonnet(), &FallbackConfig::default());
        assert_eq!(chain, vec![sonnet()]);
    }

    #[test]
    fn test_provider_preference_is_stable() {
        let config = FallbackConfig::new(vec![gpt4_turbo(), haiku()]);
        let chain = build_fallback_chain_with_provider_preference(&sonnet(), &config, "openai");
        assert_eq!(chain, vec![gpt4_turbo(), sonnet(), haiku()]);
    }

    #[test]
    fn test_provider_preference_with_no_match_keeps_order() {
        let config = FallbackConfig::new(vec![haiku()]);
        let chain = build_fallback_chain_with_provider_preference(&sonnet(), &config, "openai");
        assert_eq!(chain, vec![sonnet(), haiku()]);
    }
}
