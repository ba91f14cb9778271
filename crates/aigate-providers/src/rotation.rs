//! Round-robin credential rotation with per-credential cooldowns.
//!
//! The tracker is constructed once and shared. For each provider it keeps a
//! cursor into the credential pool and consults the [`CooldownStore`] for
//! credentials that were recently rate limited.
//!
//! Store layout (namespace `ratelimit:`):
//! - `ratelimit:{provider}:{fingerprint}`: one credential cooling down
//! - `ratelimit:{provider}:all_blocked`: every credential was cooling at the
//!   last scan; skip the provider without re-scanning until this expires

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use aigate_core::config::schema::RateLimitConfig;

use crate::credentials::{Credential, CredentialPools};
use crate::store::CooldownStore;

const KEY_PREFIX: &str = "ratelimit";

fn cooldown_key(provider: &str, credential: &Credential) -> String {
    format!("{KEY_PREFIX}:{provider}:{}", credential.fingerprint())
}

fn all_blocked_key(provider: &str) -> String {
    format!("{KEY_PREFIX}:{provider}:all_blocked")
}

pub struct RotationTracker {
    pools: CredentialPools,
    store: Arc<dyn CooldownStore>,
    default_cooldown: Duration,
    all_blocked_recheck: Duration,
}

impl RotationTracker {
    pub fn new(
        pools: CredentialPools,
        store: Arc<dyn CooldownStore>,
        config: &RateLimitConfig,
    ) -> Self {
        RotationTracker {
            pools,
            store,
            default_cooldown: Duration::from_secs(config.default_cooldown_secs),
            all_blocked_recheck: Duration::from_secs(config.all_blocked_recheck_secs),
        }
    }

    pub fn pools(&self) -> &CredentialPools {
        &self.pools
    }

    /// Number of credentials configured for `provider`.
    pub fn pool_size(&self, provider: &str) -> usize {
        self.pools.size(provider)
    }

    /// Pick the next usable credential for `provider`, round-robin.
    ///
    /// Returns `None` when the provider has no credentials or all of them are
    /// cooling down. The cursor lock is held for the whole scan so concurrent
    /// callers never pick from a stale cursor.
    pub async fn next_credential(&self, provider: &str) -> Option<Credential> {
        let pool = self.pools.get(provider)?;
        if pool.is_empty() {
            return None;
        }

        let mut cursor = pool.cursor.lock().await;

        let guard_key = all_blocked_key(provider);
        if let Some(left) = self.store.remaining(&guard_key).await {
            debug!(
                provider,
                recheck_in_secs = left.as_secs(),
                "all credentials blocked, skipping scan"
            );
            return None;
        }

        let len = pool.len();
        for offset in 0..len {
            let idx = (*cursor + offset) % len;
            let credential = &pool.credentials()[idx];
            if self
                .store
                .remaining(&cooldown_key(provider, credential))
                .await
                .is_none()
            {
                *cursor = (idx + 1) % len;
                debug!(
                    provider,
                    credential = %credential.fingerprint(),
                    index = idx,
                    "credential selected"
                );
                return Some(credential.clone());
            }
        }

        self.store.set(&guard_key, self.all_blocked_recheck).await;
        warn!(
            provider,
            credentials = len,
            recheck_secs = self.all_blocked_recheck.as_secs(),
            "all credentials cooling down"
        );
        None
    }

    /// Put `credential` on cooldown for `duration` (or the configured default).
    ///
    /// Idempotent; a repeated call refreshes the expiry.
    pub async fn mark_rate_limited(
        &self,
        provider: &str,
        credential: &Credential,
        duration: Option<Duration>,
    ) {
        let ttl = duration.unwrap_or(self.default_cooldown);
        self.store.set(&cooldown_key(provider, credential), ttl).await;
        warn!(
            provider,
            credential = %credential.fingerprint(),
            cooldown_secs = ttl.as_secs(),
            "credential rate limited"
        );
    }

    /// Cooldown left on `credential`, if any.
    pub async fn cooldown_remaining(
        &self,
        provider: &str,
        credential: &Credential,
    ) -> Option<Duration> {
        self.store
            .remaining(&cooldown_key(provider, credential))
            .await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialPool;
    use crate::store::MemoryCooldownStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    /// Memory store that counts lookups so scans can be observed.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryCooldownStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl CooldownStore for CountingStore {
        async fn remaining(&self, key: &str) -> Option<Duration> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.remaining(key).await
        }

        async fn set(&self, key: &str, ttl: Duration) {
            self.inner.set(key, ttl).await
        }
    }

    fn tracker_with(store: Arc<dyn CooldownStore>, secrets: &[&str]) -> RotationTracker {
        let mut pools = CredentialPools::new();
        let secrets: Vec<String> = secrets.iter().map(|s| s.to_string()).collect();
        pools.insert(CredentialPool::new("groq", &secrets));
        pools.insert(CredentialPool::new("gemini", &[]));
        RotationTracker::new(pools, store, &RateLimitConfig::default())
    }

    fn tracker(secrets: &[&str]) -> RotationTracker {
        tracker_with(Arc::new(MemoryCooldownStore::new()), secrets)
    }

    async fn next(tracker: &RotationTracker) -> Option<String> {
        tracker
            .next_credential("groq")
            .await
            .map(|c| c.secret().to_string())
    }

    #[tokio::test]
    async fn test_round_robin_order() {
        let tracker = tracker(&["a", "b", "c"]);
        let mut picked = Vec::new();
        for _ in 0..6 {
            picked.push(next(&tracker).await.unwrap());
        }
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_pool_returns_none() {
        let tracker = tracker(&["a"]);
        assert!(tracker.next_credential("gemini").await.is_none());
        assert!(tracker.next_credential("never-configured").await.is_none());
        assert_eq!(tracker.pool_size("gemini"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooled_credential_skipped_then_recovered() {
        let tracker = tracker(&["a", "b"]);
        let a = Credential::new("a");
        tracker
            .mark_rate_limited("groq", &a, Some(Duration::from_secs(120)))
            .await;

        // Still cooling after 60 simulated seconds.
        advance(Duration::from_secs(60)).await;
        assert_eq!(next(&tracker).await.as_deref(), Some("b"));
        assert_eq!(next(&tracker).await.as_deref(), Some("b"));

        advance(Duration::from_secs(61)).await;
        assert!(tracker.cooldown_remaining("groq", &a).await.is_none());
        assert_eq!(next(&tracker).await.as_deref(), Some("a"));
        assert_eq!(next(&tracker).await.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_cooldown_is_an_hour() {
        let tracker = tracker(&["a"]);
        let a = Credential::new("a");
        tracker.mark_rate_limited("groq", &a, None).await;
        assert_eq!(
            tracker.cooldown_remaining("groq", &a).await,
            Some(Duration::from_secs(3600))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_blocked_short_circuits_scan() {
        let store = Arc::new(CountingStore::default());
        let tracker = tracker_with(store.clone(), &["a", "b", "c"]);
        for secret in ["a", "b", "c"] {
            tracker
                .mark_rate_limited("groq", &Credential::new(secret), None)
                .await;
        }

        assert!(next(&tracker).await.is_none());
        // Guard check plus one lookup per credential.
        assert_eq!(store.lookups.load(Ordering::SeqCst), 4);

        assert!(next(&tracker).await.is_none());
        // Only the guard was consulted the second time.
        assert_eq!(store.lookups.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_does_not_shorten_cooldowns() {
        let tracker = tracker(&["a", "b"]);
        for secret in ["a", "b"] {
            tracker
                .mark_rate_limited("groq", &Credential::new(secret), Some(Duration::from_secs(300)))
                .await;
        }
        assert!(next(&tracker).await.is_none());

        // Guard expired, credentials still cooling: re-scan finds nothing.
        advance(Duration::from_secs(61)).await;
        assert!(next(&tracker).await.is_none());

        // Guard refreshed at t=61 and credentials cleared at t=300.
        advance(Duration::from_secs(240)).await;
        assert!(next(&tracker).await.is_some());
    }

    #[tokio::test]
    async fn test_mark_unknown_provider_is_harmless() {
        let tracker = tracker(&["a"]);
        let ghost = Credential::new("ghost");
        tracker.mark_rate_limited("nobody", &ghost, None).await;
        assert!(tracker.cooldown_remaining("nobody", &ghost).await.is_some());
        assert_eq!(next(&tracker).await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_store_keys_hide_secrets() {
        let cred = Credential::new("gsk_live_123");
        let key = cooldown_key("groq", &cred);
        assert!(key.starts_with("ratelimit:groq:"));
        assert!(!key.contains("gsk_live_123"));
        assert_eq!(all_blocked_key("groq"), "ratelimit:groq:all_blocked");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_rotation() {
        let tracker = Arc::new(tracker(&["a", "b", "c"]));
        let mut handles = Vec::new();
        for _ in 0..30 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move { next(&tracker).await }));
        }

        let mut counts = std::collections::HashMap::new();
        for handle in handles {
            let secret = handle.await.unwrap().unwrap();
            *counts.entry(secret).or_insert(0) += 1;
        }
        assert_eq!(counts.get("a"), Some(&10));
        assert_eq!(counts.get("b"), Some(&10));
        assert_eq!(counts.get("c"), Some(&10));
    }
}
