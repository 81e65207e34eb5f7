// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The caller-side view of which credentials are usable.

use secrecy::SecretString;

use crate::types::CredentialBelief;

/// A provider/credential registry holding cached, already-decrypted state.
///
/// The consistency guard reads beliefs from here, compares them with what
/// the vault can actually produce, and repairs the registry when they
/// disagree. Methods are synchronous because a registry is in-memory state.
pub trait CredentialRegistry: Send + Sync + 'static {
    /// Returns the belief held for `owner`, or `None` if the owner is unknown.
    fn belief(&self, owner: &str) -> Option<CredentialBelief>;

    /// Returns the secret cached by the caller, if any.
    fn cached_secret(&self, owner: &str) -> Option<SecretString>;

    /// Records a secret the vault produced: marks `has_secret` and caches it.
    fn record_secret(&self, owner: &str, secret: SecretString);

    /// Marks `authenticated` after the caller verified the secret upstream.
    fn mark_authenticated(&self, owner: &str);

    /// Resets `has_secret` and `authenticated` and drops any cached secret.
    fn downgrade(&self, owner: &str);

    /// Lists every owner the registry knows about.
    fn owners(&self) -> Vec<String>;
}
