// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup of secrets kept in plaintext by an earlier schema version.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::KeywardError;

/// A deprecated plaintext location holding `{owner -> {apiKey}}`.
///
/// Only consulted by the migration path. Lookups are best-effort: a source
/// that cannot be read should return `Ok(None)` rather than fail the caller.
#[async_trait]
pub trait LegacySecretSource: Send + Sync + 'static {
    /// Returns the plaintext secret stored for `owner`, if any.
    async fn lookup(&self, owner: &str) -> Result<Option<SecretString>, KeywardError>;

    /// Removes the plaintext copy for `owner`. Clearing an owner that has no
    /// plaintext copy is a no-op.
    async fn clear(&self, owner: &str) -> Result<(), KeywardError>;

    /// Lists every owner that still has a plaintext copy.
    async fn owners(&self) -> Result<Vec<String>, KeywardError>;
}
