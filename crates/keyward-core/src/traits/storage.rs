// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence primitive: whole-document load and save.

use async_trait::async_trait;

use crate::error::KeywardError;

/// A single named JSON document with whole-document read/write.
///
/// Implementations offer no partial updates and only eventual read-after-write
/// consistency: a `save` that returned `Ok` may not be visible to the next
/// `load` yet. The vault compensates with its post-write verification passes.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Loads the whole document. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<serde_json::Value>, KeywardError>;

    /// Replaces the whole document.
    async fn save(&self, document: &serde_json::Value) -> Result<(), KeywardError>;
}
