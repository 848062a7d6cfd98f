//! Failure classification driving retry policy
//!
//! Maps a raw provider error into a closed taxonomy. HTTP status is
//! consulted first; message text second. Vendor error text is not a stable
//! contract, so the patterns are deliberately loose and everything
//! unmatched lands in `Unknown`.

use std::fmt;

use serde::{Deserialize, Serialize};
use shunt_llm::ProviderError;

/// Why a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverReason {
    Auth,
    Billing,
    Context,
    Timeout,
    RateLimit,
    Unavailable,
    Unknown,
}

impl FailoverReason {
    /// Stable string form, used in logs and attempt records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Billing => "billing",
            Self::Context => "context",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailoverReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Classify a raw provider error into a failover reason
pub fn classify(error: &ProviderError) -> FailoverReason {
    if let Some(status) = error.status() {
        match status {
            401 | 403 => return FailoverReason::Auth,
            402 => return FailoverReason::Billing,
            413 => return FailoverReason::Context,
            408 => return FailoverReason::Timeout,
            429 => return FailoverReason::RateLimit,
            500 | 502 | 503 | 504 => return FailoverReason::Unavailable,
            _ => {}
        }
    }

    let message = error.to_string().to_lowercase();
    let matches_any = |patterns: &[&str]| patterns.iter().any(|pattern| message.contains(pattern));

    if matches_any(&["api key", "unauthorized", "authentication", "forbidden"]) {
        FailoverReason::Auth
    } else if matches_any(&["quota", "billing", "credit", "payment"]) {
        FailoverReason::Billing
    } else if matches_any(&["context window", "context length", "too long", "maximum context"]) {
        FailoverReason::Context
    } else if matches_any(&["timeout", "timed out", "deadline"]) {
        FailoverReason::Timeout
    } else if matches_any(&["rate limit", "too many requests"]) {
        FailoverReason::RateLimit
    } else if matches_any(&["unavailable", "overloaded", "bad gateway", "connection"]) {
        FailoverReason::Unavailable
    } else {
        FailoverReason::Unknown
    }
}

/// Should the failing credential be put into cooldown?
///
/// `Context` and `Unavailable` say nothing about the credential, and
/// `Unknown` gives no evidence the key is at fault.
pub fn should_mark_auth_failure(reason: FailoverReason) -> bool {
    matches!(
        reason,
        FailoverReason::Auth
            | FailoverReason::Billing
            | FailoverReason::RateLimit
            | FailoverReason::Timeout
    )
}

/// Can trying a different credential for the same provider fix this?
///
/// Mirrors [`should_mark_auth_failure`]: the reasons that condemn a
/// credential are exactly the ones another credential might not share.
pub fn should_rotate_credential(reason: FailoverReason) -> bool {
    should_mark_auth_failure(reason)
}

/// Does this failure permit advancing to the next model in the chain?
///
/// Every classified failure does; rotation, when permitted, is simply tried
/// first.
pub fn should_fallback(_reason: FailoverReason) -> bool {
    true
}
