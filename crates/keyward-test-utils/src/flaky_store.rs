// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document store that fails on command.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use keyward_core::{DocumentStore, KeywardError};
use keyward_storage::MemoryDocumentStore;

/// Wraps a [`MemoryDocumentStore`] and fails the next N loads or saves.
///
/// Failures are consumed one per call, so `fail_next_loads(2)` makes exactly
/// the next two loads fail and the third succeed.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryDocumentStore,
    failing_loads: AtomicU32,
    failing_saves: AtomicU32,
    loads: AtomicU32,
    saves: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store (clones share its document).
    pub fn wrapping(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Make the next `n` loads fail.
    pub fn fail_next_loads(&self, n: u32) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` saves fail.
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Total load calls, failed ones included.
    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Total save calls, failed ones included.
    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.loads.store(0, Ordering::SeqCst);
        self.saves.store(0, Ordering::SeqCst);
    }

    /// Direct access to the wrapped document, bypassing failure injection.
    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn load(&self) -> Result<Option<serde_json::Value>, KeywardError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_loads) {
            return Err(KeywardError::Storage {
                source: "injected load failure".into(),
            });
        }
        self.inner.load().await
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), KeywardError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_saves) {
            return Err(KeywardError::Storage {
                source: "injected save failure".into(),
            });
        }
        self.inner.save(document).await
    }
}
