//! Model catalog and alias resolution
//!
//! The catalog is a static table of known (provider, model) pairs with
//! context-window sizes and capability flags. Lookups and alias resolution
//! are pure functions over that table.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("unknown model name or alias: {0}")]
    InvalidAlias(String),
}

/// Identifies one backend model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Vendor name, e.g. "anthropic"
    pub provider: String,
    /// Model name within that vendor
    pub model: String,
}

impl ModelRef {
    /// Create a reference from provider and model names
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }

    /// Parse the canonical `provider:model` form
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        match value.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok(Self::new(provider, model))
            }
            _ => Err(CatalogError::InvalidAlias(value.to_string())),
        }
    }

    /// The canonical `provider:model` key
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.provider, self.model)
    }
}

/// What a model is good at
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub code: bool,
    pub reasoning: bool,
    pub general: bool,
    pub vision: bool,
    pub tools: bool,
}

/// Relative tier for cost, speed or quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Low,
    Medium,
    High,
}

/// Coarse cost/speed/quality placement of a model
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Characteristics {
    pub cost: Tier,
    pub speed: Tier,
    pub quality: Tier,
}

/// One catalog row; never mutated after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    pub model_ref: ModelRef,
    /// Maximum tokens across prompt + context
    pub context_window: u32,
    pub capabilities: Capabilities,
    pub characteristics: Characteristics,
}

/// Static model table plus alias resolution
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    /// Entries keyed by `provider:model`
    entries: HashMap<String, ModelCatalogEntry>,
    /// Aliases and bare model ids, lowercased
    aliases: HashMap<String, ModelRef>,
}

impl ModelCatalog {
    /// Build a catalog from entries.
    ///
    /// Bare model ids are registered as aliases automatically (first entry
    /// wins when two providers share a model id).
    pub fn new(entries: Vec<ModelCatalogEntry>) -> Self {
        let mut catalog = Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
        };
        for entry in entries {
            let model_ref = entry.model_ref.clone();
            catalog
                .aliases
                .entry(model_ref.model.to_lowercase())
                .or_insert_with(|| model_ref.clone());
            catalog.entries.insert(model_ref.key(), entry);
        }
        catalog
    }

    /// The built-in catalog shared across routers
    pub fn builtin() -> &'static ModelCatalog {
        &BUILTIN_CATALOG
    }

    /// Register a human-friendly alias
    pub fn add_alias(&mut self, alias: &str, target: ModelRef) {
        self.aliases.insert(alias.to_lowercase(), target);
    }

    /// Look up one catalog entry
    pub fn get(&self, model_ref: &ModelRef) -> Option<&ModelCatalogEntry> {
        self.entries.get(&model_ref.key())
    }

    /// Context window for a model, if known
    pub fn context_window(&self, model_ref: &ModelRef) -> Option<u32> {
        self.get(model_ref).map(|entry| entry.context_window)
    }

    /// Resolve a name or alias to a model reference.
    ///
    /// Full `provider:model` forms resolve as written (callers override
    /// everything); other names go through the alias table.
    pub fn resolve(&self, name: &str) -> Result<ModelRef, CatalogError> {
        if name.contains(':') {
            return ModelRef::parse(name);
        }
        self.aliases
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| CatalogError::InvalidAlias(name.to_string()))
    }

    /// All catalog entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &ModelCatalogEntry> {
        self.entries.values()
    }

    /// Number of cataloged models
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the catalog has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

static BUILTIN_CATALOG: Lazy<ModelCatalog> = Lazy::new(|| {
    let mut catalog = ModelCatalog::new(builtin_entries());
    for (alias, target) in [
        ("sonnet", ModelRef::new("anthropic", "claude-sonnet-4")),
        ("opus", ModelRef::new("anthropic", "claude-opus-4")),
        ("haiku", ModelRef::new("anthropic", "claude-haiku-3.5")),
        ("gpt4-turbo", ModelRef::new("openai", "gpt-4-turbo")),
        ("gpt4o", ModelRef::new("openai", "gpt-4o")),
        ("gpt4o-mini", ModelRef::new("openai", "gpt-4o-mini")),
    ] {
        catalog.add_alias(alias, target);
    }
    catalog
});

fn entry(
    provider: &str,
    model: &str,
    context_window: u32,
    capabilities: Capabilities,
    cost: Tier,
    speed: Tier,
    quality: Tier,
) -> ModelCatalogEntry {
    ModelCatalogEntry {
        model_ref: ModelRef::new(provider, model),
        context_window,
        capabilities,
        characteristics: Characteristics {
            cost,
            speed,
            quality,
        },
    }
}

/// The built-in model table
pub fn builtin_entries() -> Vec<ModelCatalogEntry> {
    let full = Capabilities {
        code: true,
        reasoning: true,
        general: true,
        vision: true,
        tools: true,
    };
    let text = Capabilities {
        code: true,
        reasoning: true,
        general: true,
        vision: false,
        tools: true,
    };
    let light = Capabilities {
        code: false,
        reasoning: false,
        general: true,
        vision: false,
        tools: true,
    };

    vec![
        entry(
            "anthropic",
            "claude-opus-4",
            200_000,
            full,
            Tier::High,
            Tier::Low,
            Tier::High,
        ),
        entry(
            "anthropic",
            "claude-sonnet-4",
            200_000,
            full,
            Tier::Medium,
            Tier::Medium,
            Tier::High,
        ),
        entry(
            "anthropic",
            "claude-sonnet-3.5",
            200_000,
            text,
            Tier::Medium,
            Tier::Medium,
            Tier::Medium,
        ),
        entry(
            "anthropic",
            "claude-haiku-3.5",
            200_000,
            light,
            Tier::Low,
            Tier::High,
            Tier::Medium,
        ),
        entry(
            "openai",
            "gpt-4-turbo",
            128_000,
            text,
            Tier::Medium,
            Tier::Medium,
            Tier::Medium,
        ),
        entry(
            "openai",
            "gpt-4o",
            128_000,
            full,
            Tier::Medium,
            Tier::Medium,
            Tier::High,
        ),
        entry(
            "openai",
            "gpt-4o-mini",
            128_000,
            light,
            Tier::Low,
            Tier::High,
            Tier::Low,
        ),
        entry(
            "azure-openai",
            "gpt-4o",
            128_000,
            full,
            Tier::Medium,
            Tier::Medium,
            Tier::High,
        ),
    ]
}
