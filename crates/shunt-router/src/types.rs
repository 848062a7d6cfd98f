//! Core request/response types for the routing engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shunt_llm::Usage;

use crate::catalog::ModelRef;
use crate::classifier::FailoverReason;
use crate::selector::TaskType;

/// A caller request, immutable once constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRequest {
    pub task_type: TaskType,
    /// The task prompt
    pub prompt: String,
    /// Supporting context supplied by the caller
    pub context: String,
    /// Explicit model override; skips task-based selection
    pub model: Option<ModelRef>,
    pub max_tokens: Option<u32>,
}

impl RuntimeRequest {
    /// Create a request for a task type
    pub fn new(task_type: TaskType, prompt: &str) -> Self {
        Self {
            task_type,
            prompt: prompt.to_string(),
            context: String::new(),
            model: None,
            max_tokens: None,
        }
    }

    /// Attach supporting context
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    /// Force a specific model
    pub fn with_model(mut self, model: ModelRef) -> Self {
        self.model = Some(model);
        self
    }

    /// Cap the generation budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Result of one successful routed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeResponse {
    /// The generated text
    pub content: String,
    /// The model that served the request
    pub model: ModelRef,
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// Record of one failed try; the list for a request is append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackAttempt {
    pub provider: String,
    pub model: String,
    pub error: String,
    pub reason: FailoverReason,
}

/// Terminal engine errors — the only errors callers ever see.
///
/// Individual provider failures are consumed inside the executor and turned
/// into rotation or fallback; they never propagate raw.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Every candidate in the fallback chain failed
    #[error("all fallback candidates failed after {} attempts", .attempts.len())]
    FallbackExhausted { attempts: Vec<FallbackAttempt> },
    /// The caller cancelled the request
    #[error("request aborted by caller")]
    Aborted,
}

impl RouterError {
    /// The ordered attempt history, empty for aborts
    pub fn attempts(&self) -> &[FallbackAttempt] {
        match self {
            Self::FallbackExhausted { attempts } => attempts,
            Self::Aborted => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = RuntimeRequest::new(TaskType::General, "hello")
            .with_context("background")
            .with_max_tokens(256);
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.context, "background");
        assert_eq!(request.max_tokens, Some(256));
        assert!(request.model.is_none());
    }

    #[test]
    fn test_exhausted_error_reports_attempt_count() {
        let error = RouterError::FallbackExhausted {
            attempts: vec![
                FallbackAttempt {
                    provider: "anthropic".to_string(),
                    model: "claude-sonnet-4".to_string(),
                    error: "Invalid API key".to_string(),
                    reason: FailoverReason::Auth,
                },
                FallbackAttempt {
                    provider: "openai".to_string(),
                    model: "gpt-4-turbo".to_string(),
                    error: "overloaded".to_string(),
                    reason: FailoverReason::Unavailable,
                },
            ],
        };
        assert!(error.to_string().contains("2 attempts"));
        assert_eq!(error.attempts().len(), 2);
    }

    #[test]
    fn test_attempt_log_serializes_for_observability() {
        let attempt = FallbackAttempt {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
            error: "rate limit reached".to_string(),
            reason: FailoverReason::RateLimit,
        };
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"reason\":\"rate_limit\""));
    }
}
