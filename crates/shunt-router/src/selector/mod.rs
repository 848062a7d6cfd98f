//! Task-based model selection
//!
//! Each task type carries an ordered preference list; the selector returns
//! the first entry, unless the caller forces a model, which always wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ModelRef;

/// Work categories driving preference lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeAnalysis,
    DecisionMaking,
    PatternMatching,
    MetricAnalysis,
    Refactoring,
    Consultation,
    General,
}

impl TaskType {
    /// Stable string form, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeAnalysis => "code_analysis",
            Self::DecisionMaking => "decision_making",
            Self::PatternMatching => "pattern_matching",
            Self::MetricAnalysis => "metric_analysis",
            Self::Refactoring => "refactoring",
            Self::Consultation => "consultation",
            Self::General => "general",
        }
    }
}

/// Ordered model preferences per task type, plus the global default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPreferences {
    preferences: HashMap<TaskType, Vec<ModelRef>>,
    default_model: ModelRef,
}

impl TaskPreferences {
    /// Empty preference table with the given default model
    pub fn new(default_model: ModelRef) -> Self {
        Self {
            preferences: HashMap::new(),
            default_model,
        }
    }

    /// The built-in preference table.
    ///
    /// `General` is deliberately unconfigured so it exercises the
    /// default-model path.
    pub fn with_defaults() -> Self {
        let sonnet = ModelRef::new("anthropic", "claude-sonnet-4");
        let opus = ModelRef::new("anthropic", "claude-opus-4");
        let haiku = ModelRef::new("anthropic", "claude-haiku-3.5");
        let gpt4o = ModelRef::new("openai", "gpt-4o");
        let gpt4o_mini = ModelRef::new("openai", "gpt-4o-mini");
        let gpt4_turbo = ModelRef::new("openai", "gpt-4-turbo");

        let mut preferences = Self::new(sonnet.clone());
        preferences.set(TaskType::CodeAnalysis, vec![sonnet.clone(), gpt4o.clone()]);
        preferences.set(TaskType::DecisionMaking, vec![opus.clone(), sonnet.clone()]);
        preferences.set(TaskType::PatternMatching, vec![haiku.clone(), gpt4o_mini]);
        preferences.set(TaskType::MetricAnalysis, vec![gpt4o.clone(), sonnet.clone()]);
        preferences.set(TaskType::Refactoring, vec![sonnet, gpt4_turbo]);
        preferences.set(TaskType::Consultation, vec![opus, gpt4o]);
        preferences
    }

    /// Replace the preference list for one task type
    pub fn set(&mut self, task_type: TaskType, models: Vec<ModelRef>) {
        self.preferences.insert(task_type, models);
    }

    /// The ordered preference list for a task type, if configured
    pub fn for_task(&self, task_type: TaskType) -> Option<&[ModelRef]> {
        self.preferences
            .get(&task_type)
            .map(|models| models.as_slice())
    }

    /// The global default model
    pub fn default_model(&self) -> &ModelRef {
        &self.default_model
    }
}

impl Default for TaskPreferences {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Per-request selection options
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Use exactly this model, skipping preference lookup entirely
    pub force_model: Option<ModelRef>,
}

/// Picks the primary model for a task
#[derive(Debug, Clone)]
pub struct ModelSelector {
    preferences: TaskPreferences,
}

impl ModelSelector {
    /// Create a selector over a preference table
    pub fn new(preferences: TaskPreferences) -> Self {
        Self { preferences }
    }

    /// Pick the primary model for a task type.
    ///
    /// A forced model wins unconditionally; otherwise the first preference
    /// entry; otherwise the global default. Same inputs, same output.
    pub fn select(&self, task_type: TaskType, options: &SelectOptions) -> ModelRef {
        if let Some(forced) = &options.force_model {
            return forced.clone();
        }
        self.preferences
            .for_task(task_type)
            .and_then(|models| models.first())
            .cloned()
            .unwrap_or_else(|| self.preferences.default_model().clone())
    }

    /// The preference table in use
    pub fn preferences(&self) -> &TaskPreferences {
        &self.preferences
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(TaskPreferences::with_defaults())
    }
}
