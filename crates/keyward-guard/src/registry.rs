// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory caller registry.

use dashmap::DashMap;
use keyward_core::{copy_secret, CredentialBelief, CredentialRegistry};
use secrecy::SecretString;

#[derive(Default)]
struct ProviderState {
    belief: CredentialBelief,
    secret: Option<SecretString>,
}

/// Per-provider credential state held by a host application.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderState>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore flags persisted by the host (no secret is cached).
    pub fn restore(&self, owner: &str, belief: CredentialBelief) {
        self.providers.entry(owner.to_string()).or_default().belief = belief;
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl CredentialRegistry for ProviderRegistry {
    fn belief(&self, owner: &str) -> Option<CredentialBelief> {
        self.providers.get(owner).map(|state| state.belief)
    }

    fn cached_secret(&self, owner: &str) -> Option<SecretString> {
        self.providers
            .get(owner)
            .and_then(|state| state.secret.as_ref().map(copy_secret))
    }

    fn record_secret(&self, owner: &str, secret: SecretString) {
        let mut state = self.providers.entry(owner.to_string()).or_default();
        state.belief.has_secret = true;
        state.secret = Some(secret);
    }

    fn mark_authenticated(&self, owner: &str) {
        self.providers
            .entry(owner.to_string())
            .or_default()
            .belief
            .authenticated = true;
    }

    fn downgrade(&self, owner: &str) {
        if let Some(mut state) = self.providers.get_mut(owner) {
            state.belief = CredentialBelief::default();
            state.secret = None;
        }
    }

    fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        owners.sort();
        owners
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn record_then_downgrade() {
        let registry = ProviderRegistry::new();
        registry.record_secret("openai", SecretString::from("sk-openai".to_string()));
        registry.mark_authenticated("openai");
        assert_eq!(
            registry.belief("openai"),
            Some(CredentialBelief {
                has_secret: true,
                authenticated: true
            })
        );
        assert_eq!(
            registry.cached_secret("openai").unwrap().expose_secret(),
            "sk-openai"
        );

        registry.downgrade("openai");
        assert_eq!(registry.belief("openai"), Some(CredentialBelief::default()));
        assert!(registry.cached_secret("openai").is_none());
    }

    #[test]
    fn restore_sets_flags_without_secret() {
        let registry = ProviderRegistry::new();
        registry.restore(
            "anthropic",
            CredentialBelief {
                has_secret: true,
                authenticated: true,
            },
        );
        assert!(registry.belief("anthropic").unwrap().expects_secret());
        assert!(registry.cached_secret("anthropic").is_none());
    }

    #[test]
    fn unknown_owner_has_no_belief() {
        let registry = ProviderRegistry::new();
        assert!(registry.belief("nobody").is_none());
        registry.downgrade("nobody");
        assert!(registry.is_empty());
    }

    #[test]
    fn owners_are_sorted() {
        let registry = ProviderRegistry::new();
        registry.mark_authenticated("openai");
        registry.mark_authenticated("anthropic");
        assert_eq!(registry.owners(), vec!["anthropic", "openai"]);
    }
}
