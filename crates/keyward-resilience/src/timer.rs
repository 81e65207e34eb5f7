// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed, cancellable delayed actions.
//!
//! Each key has at most one pending action. Scheduling again for the same key
//! cancels the previous one, which is how sliding expiry is built. Every
//! pending action can be enumerated and cancelled, so teardown never leaves a
//! callback pointing at destroyed state.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

struct Pending {
    id: u64,
    token: CancellationToken,
}

struct Registry<K> {
    pending: HashMap<K, Pending>,
    next_id: u64,
}

/// A set of delayed actions keyed by `K`, running on the tokio runtime.
///
/// `schedule` must be called from within a tokio runtime. Dropping the
/// `DelayedTasks` cancels everything still pending.
pub struct DelayedTasks<K> {
    registry: Arc<Mutex<Registry<K>>>,
}

impl<K> DelayedTasks<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                pending: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Run `action` after `delay` unless cancelled or rescheduled first.
    /// Replaces any action already pending for `key`.
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            let previous = registry.pending.insert(
                key.clone(),
                Pending {
                    id,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.token.cancel();
            }
            id
        };

        let registry = Arc::downgrade(&self.registry);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if claim(&registry, &key, id) {
                        action();
                    }
                }
            }
        });
    }

    /// Cancel the action pending for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.registry).pending.remove(key) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending action. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Pending> = lock(&self.registry)
            .pending
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        for pending in &drained {
            pending.token.cancel();
        }
        drained.len()
    }

    /// Number of actions still pending.
    pub fn pending(&self) -> usize {
        lock(&self.registry).pending.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.registry).pending.contains_key(key)
    }
}

impl<K> Default for DelayedTasks<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for DelayedTasks<K> {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        for (_, pending) in registry.pending.drain() {
            pending.token.cancel();
        }
    }
}

/// Remove the fired entry if it is still the current one for `key`.
fn claim<K: Eq + Hash>(registry: &Weak<Mutex<Registry<K>>>, key: &K, id: u64) -> bool {
    let Some(registry) = registry.upgrade() else {
        return false;
    };
    let mut registry = lock(&registry);
    match registry.pending.get(key) {
        Some(pending) if pending.id == id => {
            registry.pending.remove(key);
            true
        }
        _ => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
