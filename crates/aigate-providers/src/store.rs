//! Cooldown storage.
//!
//! [`CooldownStore`] is the seam for a shared TTL store. An elapsed entry must
//! behave exactly like a missing one. [`MemoryCooldownStore`] is the
//! in-process implementation; it reads time from `tokio::time` so tests can
//! pause and advance the clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// A TTL key/value store holding cooldown expiries.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Time left on `key`, or `None` when it is absent or expired.
    async fn remaining(&self, key: &str) -> Option<Duration>;

    /// Insert or refresh `key` so it expires `ttl` from now. Last writer wins.
    async fn set(&self, key: &str, ttl: Duration);
}

/// Mutex-protected in-memory store.
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn remaining(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries();
        let expiry = *entries.get(key)?;
        let now = Instant::now();
        if expiry > now {
            Some(expiry - now)
        } else {
            entries.remove(key);
            None
        }
    }

    async fn set(&self, key: &str, ttl: Duration) {
        self.entries().insert(key.to_string(), Instant::now() + ttl);
    }
}
