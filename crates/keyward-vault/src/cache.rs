// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext cache with sliding expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use keyward_core::copy_secret;
use keyward_resilience::DelayedTasks;
use secrecy::SecretString;
use tokio::time::Instant;
use tracing::trace;

struct CacheEntry {
    plaintext: SecretString,
    expires_at: Instant,
}

type Entries = Mutex<HashMap<String, CacheEntry>>;

/// Decrypted secrets keyed by owner id.
///
/// Every insert or hit (re)starts a delayed eviction for that owner. Reads
/// also check `expires_at`, so an entry is never served past its TTL even if
/// its timer has not fired yet. Must be used within a tokio runtime.
pub struct SecretCache {
    entries: Arc<Entries>,
    timers: DelayedTasks<String>,
    ttl: Duration,
}

impl SecretCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            timers: DelayedTasks::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a copy of the cached secret and slides its expiry.
    pub fn get(&self, owner: &str) -> Option<SecretString> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let entry = entries.get_mut(owner)?;
        if entry.expires_at <= now {
            entries.remove(owner);
            drop(entries);
            self.timers.cancel(&owner.to_string());
            return None;
        }
        entry.expires_at = now + self.ttl;
        let secret = copy_secret(&entry.plaintext);
        drop(entries);
        self.schedule_eviction(owner);
        Some(secret)
    }

    pub fn insert(&self, owner: &str, plaintext: SecretString) {
        lock(&self.entries).insert(
            owner.to_string(),
            CacheEntry {
                plaintext,
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.schedule_eviction(owner);
    }

    /// Evict `owner` and cancel its timer. Returns whether it was cached.
    pub fn remove(&self, owner: &str) -> bool {
        let removed = lock(&self.entries).remove(owner).is_some();
        self.timers.cancel(&owner.to_string());
        removed
    }

    /// Evict everything and cancel every pending timer.
    pub fn clear(&self) -> usize {
        let count = {
            let mut entries = lock(&self.entries);
            let count = entries.len();
            entries.clear();
            count
        };
        self.timers.cancel_all();
        count
    }

    pub fn contains(&self, owner: &str) -> bool {
        lock(&self.entries).contains_key(owner)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of eviction timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    fn schedule_eviction(&self, owner: &str) {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let key = owner.to_string();
        self.timers.schedule(owner.to_string(), self.ttl, move || {
            if let Some(entries) = entries.upgrade() {
                let mut entries = lock(&entries);
                if entries
                    .get(&key)
                    .is_some_and(|entry| entry.expires_at <= Instant::now())
                {
                    entries.remove(&key);
                    trace!(owner = %key, "cache entry expired");
                }
            }
        });
    }
}

impl Drop for SecretCache {
    fn drop(&mut self) {
        self.clear();
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hit_returns_copy() {
        let cache = SecretCache::new(Duration::from_secs(300));
        cache.insert("openai", secret("sk-openai"));
        assert_eq!(cache.get("openai").unwrap().expose_secret(), "sk-openai");
        assert!(cache.get("anthropic").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = SecretCache::new(Duration::from_secs(300));
        cache.insert("openai", secret("sk-openai"));

        tokio::time::sleep(Duration::from_secs(301)).await;
        settle().await;

        assert!(!cache.contains("openai"));
        assert_eq!(cache.pending_timers(), 0);
        assert!(cache.get("openai").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reads_slide_the_expiry() {
        let cache = SecretCache::new(Duration::from_secs(300));
        cache.insert("openai", secret("sk-openai"));

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(cache.get("openai").is_some());
        tokio::time::sleep(Duration::from_secs(200)).await;
        settle().await;

        // 400s after insert but only 200s after the last read.
        assert!(cache.get("openai").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_cancels_timer() {
        let cache = SecretCache::new(Duration::from_secs(300));
        cache.insert("openai", secret("sk-openai"));
        assert_eq!(cache.pending_timers(), 1);

        assert!(cache.remove("openai"));
        assert!(!cache.remove("openai"));
        assert_eq!(cache.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_every_timer() {
        let cache = SecretCache::new(Duration::from_secs(300));
        cache.insert("a", secret("secret-a"));
        cache.insert("b", secret("secret-b"));
        cache.insert("c", secret("secret-c"));

        assert_eq!(cache.clear(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.pending_timers(), 0);
    }
}
