//! Pre-flight context window validation
//!
//! Validation is pure: no state changes, no network. The catalog window is
//! authoritative unless a per-model override says otherwise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{ModelCatalog, ModelRef};
use crate::tokens::TokenEstimator;
use crate::types::RuntimeRequest;

/// Default hard minimum: models with smaller windows are unusable
pub const DEFAULT_HARD_MINIMUM: u32 = 16_000;
/// Default warn threshold: smaller windows work but draw a warning
pub const DEFAULT_WARN_BELOW: u32 = 32_000;

/// Guard thresholds and per-model window overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Windows below this are treated as misconfigured, regardless of
    /// request size
    pub hard_minimum: u32,
    /// Windows below this draw a warning
    pub warn_below: u32,
    /// Effective-window overrides keyed by `provider:model`
    pub overrides: HashMap<String, u32>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            hard_minimum: DEFAULT_HARD_MINIMUM,
            warn_below: DEFAULT_WARN_BELOW,
            overrides: HashMap::new(),
        }
    }
}

impl GuardConfig {
    /// Override the effective window for one model
    pub fn with_override(mut self, model: &ModelRef, context_window: u32) -> Self {
        self.overrides.insert(model.key(), context_window);
        self
    }
}

/// Outcome of validating one request against one model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub should_warn: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validates requests against a model's effective context window
#[derive(Debug, Clone, Default)]
pub struct ContextWindowGuard {
    config: GuardConfig,
    estimator: TokenEstimator,
}

impl ContextWindowGuard {
    /// Create a guard with the given configuration
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            estimator: TokenEstimator::new(),
        }
    }

    /// The effective window for a model: override first, catalog second
    pub fn effective_window(&self, catalog: &ModelCatalog, model: &ModelRef) -> Option<u32> {
        self.config
            .overrides
            .get(&model.key())
            .copied()
            .or_else(|| catalog.context_window(model))
    }

    /// Validate a request against a candidate model
    pub fn validate(
        &self,
        request: &RuntimeRequest,
        model: &ModelRef,
        catalog: &ModelCatalog,
    ) -> Validation {
        let mut validation = Validation {
            is_valid: true,
            ..Validation::default()
        };

        let Some(window) = self.effective_window(catalog, model) else {
            validation.is_valid = false;
            validation
                .errors
                .push(format!("no context window known for model {model}"));
            return validation;
        };

        if window < self.config.hard_minimum {
            validation.is_valid = false;
            validation.errors.push(format!(
                "context window {window} for {model} is below hard minimum {}",
                self.config.hard_minimum
            ));
            return validation;
        }

        if window < self.config.warn_below {
            validation.should_warn = true;
            validation.warnings.push(format!(
                "context window {window} for {model} is below recommended minimum {}",
                self.config.warn_below
            ));
        }

        let estimated = self
            .estimator
            .estimate_request(&request.prompt, &request.context);
        if estimated > window {
            validation.is_valid = false;
            validation.errors.push(format!(
                "estimated {estimated} tokens exceed the {window}-token context window of {model}"
            ));
        }

        validation
    }
}
