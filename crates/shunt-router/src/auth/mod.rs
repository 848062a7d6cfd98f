//! Credential pool with health tracking and cooldown rotation
//!
//! One `AuthProfile` per API key. The table is the only shared mutable
//! state in the engine and sits behind a single async mutex: claiming a
//! profile and stamping its `last_used` happen in the same critical
//! section, so two in-flight requests can never both observe the same
//! profile as least-recently-used.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Cooldown backoff configuration
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    /// First-failure cooldown
    pub base: Duration,
    /// Ceiling for repeated failures
    pub cap: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

/// One API credential plus its health bookkeeping.
///
/// Owned exclusively by the manager; mutated only through
/// `mark_success`/`mark_failure`. Values handed out by
/// `get_available_profile` are point-in-time copies.
#[derive(Debug, Clone)]
pub struct AuthProfile {
    pub id: String,
    pub provider: String,
    pub api_key: String,
    /// When this profile was last claimed for a call
    pub last_used: Option<Instant>,
    /// Wall-clock time of the last successful call
    pub last_good: Option<DateTime<Utc>>,
    /// Consecutive failures since the last success
    pub failure_count: u32,
    /// Excluded from selection until this instant
    pub cooldown_until: Option<Instant>,
    pub success_count: u64,
}

impl AuthProfile {
    /// Create a fresh profile for a provider credential
    pub fn new(provider: &str, api_key: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider: provider.to_string(),
            api_key: api_key.to_string(),
            last_used: None,
            last_good: None,
            failure_count: 0,
            cooldown_until: None,
            success_count: 0,
        }
    }

    /// True while the profile is excluded from selection
    pub fn in_cooldown(&self) -> bool {
        self.cooldown_until
            .is_some_and(|until| until > Instant::now())
    }
}

/// Read-only health view of one profile
#[derive(Debug, Clone)]
pub struct AuthProfileSnapshot {
    pub id: String,
    pub provider: String,
    pub failure_count: u32,
    pub success_count: u64,
    pub in_cooldown: bool,
    /// Time left in cooldown, if any
    pub cooldown_remaining: Option<Duration>,
    pub last_good: Option<DateTime<Utc>>,
}

impl AuthProfileSnapshot {
    fn of(profile: &AuthProfile) -> Self {
        let now = Instant::now();
        let cooldown_remaining = profile
            .cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now);
        Self {
            id: profile.id.clone(),
            provider: profile.provider.clone(),
            failure_count: profile.failure_count,
            success_count: profile.success_count,
            in_cooldown: cooldown_remaining.is_some(),
            cooldown_remaining,
            last_good: profile.last_good,
        }
    }
}

/// Owns every credential and decides which one serves the next call
#[derive(Debug)]
pub struct AuthProfileManager {
    profiles: Mutex<HashMap<String, AuthProfile>>,
    cooldown: CooldownConfig,
}

impl AuthProfileManager {
    /// Empty manager with default cooldown settings
    pub fn new() -> Self {
        Self::with_cooldown(CooldownConfig::default())
    }

    /// Empty manager with custom cooldown settings
    pub fn with_cooldown(cooldown: CooldownConfig) -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Manager pre-populated with profiles (used at construction time,
    /// before anything is shared)
    pub fn with_profiles(profiles: Vec<AuthProfile>, cooldown: CooldownConfig) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            profiles: Mutex::new(profiles),
            cooldown,
        }
    }

    /// Register a credential; returns the new profile id
    pub async fn add_profile(&self, provider: &str, api_key: &str) -> String {
        self.add(AuthProfile::new(provider, api_key)).await
    }

    /// Register a profile with explicit state; returns its id
    pub async fn add(&self, profile: AuthProfile) -> String {
        let id = profile.id.clone();
        let mut profiles = self.profiles.lock().await;
        profiles.insert(id.clone(), profile);
        id
    }

    /// Remove a profile
    pub async fn remove_profile(&self, id: &str) -> Option<AuthProfile> {
        let mut profiles = self.profiles.lock().await;
        profiles.remove(id)
    }

    /// Claim the least-recently-used profile for `provider` whose cooldown
    /// has expired.
    ///
    /// The claim stamps `last_used` inside the same lock acquisition, which
    /// is what spreads concurrent load round-robin across keys. Returns a
    /// point-in-time copy, or `None` when every profile is cooling down.
    pub async fn get_available_profile(&self, provider: &str) -> Option<AuthProfile> {
        let mut profiles = self.profiles.lock().await;
        let now = Instant::now();
        let profile = profiles
            .values_mut()
            .filter(|profile| profile.provider == provider)
            .filter(|profile| profile.cooldown_until.is_none_or(|until| until <= now))
            .min_by_key(|profile| profile.last_used)?;
        profile.last_used = Some(now);
        Some(profile.clone())
    }

    /// True when at least one profile for `provider` is out of cooldown
    pub async fn has_available(&self, provider: &str) -> bool {
        let profiles = self.profiles.lock().await;
        let now = Instant::now();
        profiles
            .values()
            .filter(|profile| profile.provider == provider)
            .any(|profile| profile.cooldown_until.is_none_or(|until| until <= now))
    }

    /// Number of profiles registered for `provider`
    pub async fn profile_count(&self, provider: &str) -> usize {
        let profiles = self.profiles.lock().await;
        profiles
            .values()
            .filter(|profile| profile.provider == provider)
            .count()
    }

    /// Record a failed call: bump the failure count and extend the cooldown
    /// exponentially (base doubles per consecutive failure, capped).
    pub async fn mark_failure(&self, id: &str) {
        let mut profiles = self.profiles.lock().await;
        let Some(profile) = profiles.get_mut(id) else {
            return;
        };
        profile.failure_count += 1;
        let exponent = profile.failure_count.saturating_sub(1).min(10);
        let backoff = self
            .cooldown
            .base
            .saturating_mul(1_u32 << exponent)
            .min(self.cooldown.cap);
        let until = Instant::now() + backoff;
        // cooldown_until never moves backwards between consecutive failures
        profile.cooldown_until = Some(match profile.cooldown_until {
            Some(previous) if previous > until => previous,
            _ => until,
        });
        tracing::warn!(
            provider = %profile.provider,
            profile = %profile.id,
            failures = profile.failure_count,
            cooldown_ms = backoff.as_millis() as u64,
            "credential placed in cooldown"
        );
    }

    /// Record a successful call: reset failures and stamp usage
    pub async fn mark_success(&self, id: &str) {
        let mut profiles = self.profiles.lock().await;
        let Some(profile) = profiles.get_mut(id) else {
            return;
        };
        if profile.failure_count > 0 {
            tracing::info!(
                provider = %profile.provider,
                profile = %profile.id,
                "credential recovered"
            );
        }
        profile.failure_count = 0;
        profile.last_good = Some(Utc::now());
        profile.last_used = Some(Instant::now());
        profile.success_count += 1;
    }

    /// Health snapshot of every profile for `provider`
    pub async fn snapshot(&self, provider: &str) -> Vec<AuthProfileSnapshot> {
        let profiles = self.profiles.lock().await;
        profiles
            .values()
            .filter(|profile| profile.provider == provider)
            .map(AuthProfileSnapshot::of)
            .collect()
    }

    /// Health snapshot of one profile
    pub async fn snapshot_profile(&self, id: &str) -> Option<AuthProfileSnapshot> {
        let profiles = self.profiles.lock().await;
        profiles.get(id).map(AuthProfileSnapshot::of)
    }
}

impl Default for AuthProfileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lru_selection_alternates_between_keys() {
        let manager = AuthProfileManager::new();
        let first = manager.add_profile("anthropic", "key-1").await;
        let second = manager.add_profile("anthropic", "key-2").await;

        let mut claimed = Vec::new();
        for _ in 0..4 {
            let profile = manager.get_available_profile("anthropic").await.unwrap();
            claimed.push(profile.id);
            // keep last_used stamps strictly ordered
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(claimed.iter().filter(|id| **id == first).count(), 2);
        assert_eq!(claimed.iter().filter(|id| **id == second).count(), 2);
        assert_ne!(claimed[0], claimed[1]);
        assert_ne!(claimed[2], claimed[3]);
    }

    #[tokio::test]
    async fn test_unknown_provider_has_no_profile() {
        let manager = AuthProfileManager::new();
        assert!(manager.get_available_profile("openai").await.is_none());
    }

    #[tokio::test]
    async fn test_cooldown_excludes_profile() {
        let manager = AuthProfileManager::new();
        let only = manager.add_profile("anthropic", "key-1").await;

        manager.mark_failure(&only).await;
        assert!(manager.get_available_profile("anthropic").await.is_none());
        assert!(!manager.has_available("anthropic").await);

        let snapshot = manager.snapshot_profile(&only).await.unwrap();
        assert_eq!(snapshot.failure_count, 1);
        assert!(snapshot.in_cooldown);
    }

    #[tokio::test]
    async fn test_backoff_grows_and_never_shrinks() {
        let manager = AuthProfileManager::new();
        let id = manager.add_profile("anthropic", "key-1").await;

        manager.mark_failure(&id).await;
        let first_until = {
            let profiles = manager.profiles.lock().await;
            profiles[&id].cooldown_until.unwrap()
        };

        manager.mark_failure(&id).await;
        let second_until = {
            let profiles = manager.profiles.lock().await;
            profiles[&id].cooldown_until.unwrap()
        };

        assert!(second_until >= first_until);
        let profiles = manager.profiles.lock().await;
        assert_eq!(profiles[&id].failure_count, 2);
    }

    #[tokio::test]
    async fn test_backoff_is_capped() {
        let cooldown = CooldownConfig::default();
        let cap = cooldown.cap;
        let manager = AuthProfileManager::with_cooldown(cooldown);
        let id = manager.add_profile("anthropic", "key-1").await;

        for _ in 0..12 {
            manager.mark_failure(&id).await;
        }

        let snapshot = manager.snapshot_profile(&id).await.unwrap();
        assert_eq!(snapshot.failure_count, 12);
        assert!(snapshot.cooldown_remaining.unwrap() <= cap);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let manager = AuthProfileManager::new();
        let id = manager.add_profile("anthropic", "key-1").await;

        manager.mark_failure(&id).await;
        manager.mark_success(&id).await;

        let snapshot = manager.snapshot_profile(&id).await.unwrap();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 1);
        assert!(snapshot.last_good.is_some());
    }

    #[tokio::test]
    async fn test_remove_profile() {
        let manager = AuthProfileManager::new();
        let id = manager.add_profile("anthropic", "key-1").await;
        assert_eq!(manager.profile_count("anthropic").await, 1);

        manager.remove_profile(&id).await.unwrap();
        assert_eq!(manager.profile_count("anthropic").await, 0);
    }
}
