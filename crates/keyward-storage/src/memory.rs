// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store.
//!
//! Not persistent: the document is lost when the process exits. Reads see
//! writes immediately, which makes it the well-behaved baseline that test
//! doubles wrap to simulate flaky or eventually-consistent backends.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use keyward_core::{DocumentStore, KeywardError};

/// A document held behind a `RwLock`. Clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    document: Arc<RwLock<Option<serde_json::Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with `document`.
    pub fn with_document(document: serde_json::Value) -> Self {
        Self {
            document: Arc::new(RwLock::new(Some(document))),
        }
    }

    /// Replace the document without going through [`DocumentStore::save`].
    pub async fn replace(&self, document: Option<serde_json::Value>) {
        *self.document.write().await = document;
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Option<serde_json::Value>, KeywardError> {
        Ok(self.document.read().await.clone())
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), KeywardError> {
        *self.document.write().await = Some(document.clone());
        Ok(())
    }
}
