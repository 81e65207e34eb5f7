// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document store whose writes are acknowledged but not durable.

use async_trait::async_trait;
use tokio::sync::Mutex;

use keyward_core::{DocumentStore, KeywardError};

#[derive(Debug, Default)]
struct State {
    durable: Option<serde_json::Value>,
    visible: Option<serde_json::Value>,
    /// Reads left before `visible` reverts to `durable`.
    reads_until_revert: Option<u32>,
}

/// Simulates an eventually-consistent backend that loses writes.
///
/// While armed, every `save` is visible to the next `visible_reads` loads and
/// then reverts to the last durable document, as if the backend acknowledged
/// a write that never reached disk. With `visible_reads == 0` the write is
/// never visible at all. Disarmed, it behaves like a plain memory store.
#[derive(Debug, Default)]
pub struct UndurableStore {
    state: Mutex<State>,
    visible_reads: Mutex<Option<u32>>,
}

impl UndurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves revert after `visible_reads` loads.
    pub async fn arm(&self, visible_reads: u32) {
        *self.visible_reads.lock().await = Some(visible_reads);
    }

    /// Make subsequent saves durable again.
    pub async fn disarm(&self) {
        *self.visible_reads.lock().await = None;
    }
}

#[async_trait]
impl DocumentStore for UndurableStore {
    fn name(&self) -> &str {
        "undurable"
    }

    async fn load(&self) -> Result<Option<serde_json::Value>, KeywardError> {
        let mut state = self.state.lock().await;
        match state.reads_until_revert {
            Some(0) => {
                state.visible = state.durable.clone();
                state.reads_until_revert = None;
            }
            Some(n) => state.reads_until_revert = Some(n - 1),
            None => {}
        }
        Ok(state.visible.clone())
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), KeywardError> {
        let armed = *self.visible_reads.lock().await;
        let mut state = self.state.lock().await;
        match armed {
            Some(0) => {
                state.visible = state.durable.clone();
                state.reads_until_revert = None;
            }
            Some(n) => {
                state.visible = Some(document.clone());
                state.reads_until_revert = Some(n);
            }
            None => {
                state.durable = Some(document.clone());
                state.visible = Some(document.clone());
                state.reads_until_revert = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn disarmed_store_is_durable() {
        let store = UndurableStore::new();
        store.save(&json!({"v": 1})).await.unwrap();
        for _ in 0..3 {
            assert_eq!(store.load().await.unwrap(), Some(json!({"v": 1})));
        }
    }

    #[tokio::test]
    async fn armed_write_reverts_after_visible_reads() {
        let store = UndurableStore::new();
        store.save(&json!({"v": 1})).await.unwrap();
        store.arm(1).await;
        store.save(&json!({"v": 2})).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(json!({"v": 2})));
        assert_eq!(store.load().await.unwrap(), Some(json!({"v": 1})));
        assert_eq!(store.load().await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn zero_visible_reads_drops_write() {
        let store = UndurableStore::new();
        store.arm(0).await;
        store.save(&json!({"v": 2})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
