// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The recovery ladder.
//!
//! Invariant maintained: if the registry believes an owner is authenticated,
//! the vault produces a correctly-decrypting secret for it. When the two
//! disagree, [`ConsistencyGuard::resolve`] tries, in order:
//!
//! 1. an immediate re-fetch from the vault,
//! 2. a bounded retry with backoff (skipped for integrity failures),
//! 3. the legacy plaintext location, migrating what it finds,
//! 4. downgrading the registry's belief.
//!
//! This is the only place a hard vault failure turns into a soft, logged
//! downgrade.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use keyward_config::model::KeywardConfig;
use keyward_core::{copy_secret, CredentialRegistry, KeywardError, LegacySecretSource};
use keyward_resilience::{retry, RetryPolicy};
use keyward_vault::{migrate_legacy_secret, EntryStatus, MigrationOutcome, VaultContainer};
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::health::{self, HealthReport};

/// Which rung of the ladder produced the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryRung {
    ImmediateRefetch,
    BoundedRetry,
    LegacyMigration,
}

/// Outcome of [`ConsistencyGuard::resolve`].
#[derive(Debug)]
pub enum Resolution {
    /// The registry already held the secret.
    Cached(SecretString),
    /// The ladder produced the secret and the registry now holds it.
    Recovered {
        secret: SecretString,
        rung: RecoveryRung,
        /// Vault and legacy reads made across the whole ladder.
        attempts: u32,
    },
    /// No secret anywhere, and the registry did not expect one.
    Absent,
    /// The registry expected a secret that could not be produced; its
    /// belief has been reset.
    Downgraded { reason: String },
}

impl Resolution {
    pub fn secret(&self) -> Option<&SecretString> {
        match self {
            Resolution::Cached(secret) | Resolution::Recovered { secret, .. } => Some(secret),
            Resolution::Absent | Resolution::Downgraded { .. } => None,
        }
    }

    pub fn into_secret(self) -> Option<SecretString> {
        match self {
            Resolution::Cached(secret) | Resolution::Recovered { secret, .. } => Some(secret),
            Resolution::Absent | Resolution::Downgraded { .. } => None,
        }
    }

    pub fn rung(&self) -> Option<RecoveryRung> {
        match self {
            Resolution::Recovered { rung, .. } => Some(*rung),
            _ => None,
        }
    }
}

/// Read-only findings for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub owner: String,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Diagnosis {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    fn flag(&mut self, issue: impl Into<String>, recommendation: impl Into<String>) {
        self.issues.push(issue.into());
        self.recommendations.push(recommendation.into());
    }
}

/// Why a vault read did not produce a secret.
#[derive(Debug)]
enum Miss {
    Absent,
    Failed(KeywardError),
}

impl std::fmt::Display for Miss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Miss::Absent => f.write_str("no entry in vault"),
            Miss::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl Miss {
    fn is_retryable(&self) -> bool {
        match self {
            Miss::Absent => true,
            Miss::Failed(e) => !e.is_not_retryable(),
        }
    }
}

/// Reconciles a [`CredentialRegistry`] with a [`VaultContainer`].
pub struct ConsistencyGuard {
    vault: Arc<VaultContainer>,
    registry: Arc<dyn CredentialRegistry>,
    legacy: Option<Arc<dyn LegacySecretSource>>,
    recovery: RetryPolicy,
}

impl ConsistencyGuard {
    /// `legacy` is consulted only when `guard.legacy_migration` is enabled.
    pub fn new(
        vault: Arc<VaultContainer>,
        registry: Arc<dyn CredentialRegistry>,
        legacy: Option<Arc<dyn LegacySecretSource>>,
        config: &KeywardConfig,
    ) -> Self {
        Self {
            vault,
            registry,
            legacy: legacy.filter(|_| config.guard.legacy_migration),
            recovery: RetryPolicy::linear(
                config.retry.recovery_attempts,
                Duration::from_millis(config.retry.recovery_backoff_ms),
            ),
        }
    }

    pub fn vault(&self) -> &Arc<VaultContainer> {
        &self.vault
    }

    pub fn registry(&self) -> &Arc<dyn CredentialRegistry> {
        &self.registry
    }

    /// Produce the secret for `owner`, repairing the registry if needed.
    ///
    /// Never fails: every error ends either in a later rung's success or in
    /// a logged downgrade.
    pub async fn resolve(&self, owner: &str) -> Resolution {
        if let Some(secret) = self.registry.cached_secret(owner) {
            return Resolution::Cached(secret);
        }
        let expects_secret = self
            .registry
            .belief(owner)
            .is_some_and(|belief| belief.expects_secret());
        let mut attempts = 0;

        // Rung 1: immediate re-fetch.
        attempts += 1;
        let first_miss = match self.fetch(owner).await {
            Ok(secret) => return self.recovered(owner, secret, RecoveryRung::ImmediateRefetch, attempts),
            Err(miss) => miss,
        };
        debug!(owner = %owner, reason = %first_miss, "immediate re-fetch missed");

        // Rung 2: bounded retry. Absence is only worth retrying when the
        // registry says something should be there.
        let worth_retrying = match &first_miss {
            Miss::Absent => expects_secret,
            Miss::Failed(e) => !e.is_not_retryable(),
        };
        let mut last_miss = first_miss;
        if worth_retrying {
            let outcome = retry(&self.recovery, "guard.refetch", Miss::is_retryable, move |_| {
                self.fetch(owner)
            })
            .await;
            match outcome {
                Ok(retried) => {
                    attempts += retried.attempts;
                    return self.recovered(owner, retried.value, RecoveryRung::BoundedRetry, attempts);
                }
                Err(exhausted) => {
                    attempts += exhausted.attempts;
                    last_miss = exhausted.last_error;
                }
            }
        } else if let Miss::Failed(e) = &last_miss {
            debug!(owner = %owner, error = %e, "skipping retry, failure is not transient");
        }

        // Rung 3: legacy plaintext location.
        if let Some(legacy) = &self.legacy {
            attempts += 1;
            if let Some(secret) = self.migrate_from_legacy(legacy.as_ref(), owner).await {
                return self.recovered(owner, secret, RecoveryRung::LegacyMigration, attempts);
            }
        }

        // Rung 4: reconcile the registry with what exists.
        let hard_failure = matches!(last_miss, Miss::Failed(_));
        if !expects_secret && !hard_failure {
            return Resolution::Absent;
        }
        let reason = match last_miss {
            Miss::Absent => "no secret in vault or legacy location".to_string(),
            Miss::Failed(e) => e.to_string(),
        };
        self.registry.downgrade(owner);
        self.vault.evict(owner);
        warn!(
            owner = %owner,
            attempts,
            reason = %reason,
            "credential could not be recovered; registry state downgraded"
        );
        Resolution::Downgraded { reason }
    }

    /// Resolve every owner the registry knows, concurrently.
    pub async fn reconcile_all(&self) -> Vec<(String, Resolution)> {
        let owners = self.registry.owners();
        let resolutions = join_all(owners.iter().map(|owner| self.resolve(owner))).await;
        let results: Vec<(String, Resolution)> = owners.into_iter().zip(resolutions).collect();
        let downgraded = results
            .iter()
            .filter(|(_, r)| matches!(r, Resolution::Downgraded { .. }))
            .count();
        info!(owners = results.len(), downgraded, "registry reconciled with vault");
        results
    }

    /// Describe what is inconsistent for `owner` without changing anything.
    pub async fn diagnose(&self, owner: &str) -> Diagnosis {
        let mut diagnosis = Diagnosis {
            owner: owner.to_string(),
            ..Diagnosis::default()
        };
        let belief = self.registry.belief(owner).unwrap_or_default();

        match self.vault.inspect(owner).await {
            Ok(EntryStatus::Absent) if belief.expects_secret() => diagnosis.flag(
                "registry expects a secret but the vault has no entry",
                "store the credential again, or resolve to reconcile the registry",
            ),
            Ok(EntryStatus::Absent) => {}
            Ok(EntryStatus::Present { .. }) if !belief.has_secret => diagnosis.flag(
                "vault holds a secret the registry does not know about",
                "resolve the owner to load the stored secret",
            ),
            Ok(EntryStatus::Present { .. }) => {}
            Ok(EntryStatus::Corrupted { reason }) => diagnosis.flag(
                format!("vault entry exists but is corrupted: {reason}"),
                "remove the entry and store the credential again",
            ),
            Err(e) => diagnosis.flag(
                format!("vault could not be read: {e}"),
                "check that the persistence backend is reachable",
            ),
        }

        if let Some(legacy) = &self.legacy {
            match legacy.lookup(owner).await {
                Ok(Some(_)) => diagnosis.flag(
                    "a plaintext copy remains at the legacy location",
                    "run legacy migration to encrypt it and clear the plaintext",
                ),
                Ok(None) => {}
                Err(e) => diagnosis.flag(
                    format!("legacy location could not be read: {e}"),
                    "check the legacy configuration path",
                ),
            }
        }
        diagnosis
    }

    /// Weighted health over vault integrity, belief consistency, and
    /// decryptability of the owners the registry relies on.
    pub async fn aggregate_health(&self) -> HealthReport {
        let report = self.vault.perform_integrity_check().await;
        let beliefs: Vec<_> = self
            .registry
            .owners()
            .into_iter()
            .filter_map(|owner| self.registry.belief(&owner).map(|belief| (owner, belief)))
            .collect();
        health::score(&report, &beliefs)
    }

    async fn fetch(&self, owner: &str) -> Result<SecretString, Miss> {
        match self.vault.get_key(owner).await {
            Ok(Some(secret)) => Ok(secret),
            Ok(None) => Err(Miss::Absent),
            Err(e) => Err(Miss::Failed(e)),
        }
    }

    async fn migrate_from_legacy(
        &self,
        legacy: &dyn LegacySecretSource,
        owner: &str,
    ) -> Option<SecretString> {
        match migrate_legacy_secret(&self.vault, legacy, owner).await {
            Ok(MigrationOutcome::NotFound) => None,
            Ok(
                MigrationOutcome::Migrated
                | MigrationOutcome::Repaired
                | MigrationOutcome::AlreadyInVault,
            ) => {
                match self.vault.get_key(owner).await {
                    Ok(secret) => secret,
                    Err(e) => {
                        warn!(owner = %owner, error = %e, "vault read failed after legacy migration");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "legacy migration failed");
                None
            }
        }
    }

    fn recovered(
        &self,
        owner: &str,
        secret: SecretString,
        rung: RecoveryRung,
        attempts: u32,
    ) -> Resolution {
        self.registry.record_secret(owner, copy_secret(&secret));
        if rung != RecoveryRung::ImmediateRefetch {
            info!(owner = %owner, %rung, attempts, "credential recovered");
        }
        Resolution::Recovered {
            secret,
            rung,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use keyward_core::{CredentialBelief, DocumentStore};
    use keyward_storage::MemoryDocumentStore;
    use keyward_test_utils::{FlakyStore, MemoryLegacySource};
    use keyward_vault::CryptoEngine;
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;
    use crate::registry::ProviderRegistry;

    const AUTHENTICATED: CredentialBelief = CredentialBelief {
        has_secret: true,
        authenticated: true,
    };

    struct Fixture {
        guard: ConsistencyGuard,
        registry: Arc<ProviderRegistry>,
        vault: Arc<VaultContainer>,
    }

    fn fixture(
        store: Arc<dyn DocumentStore>,
        legacy: Option<Arc<dyn LegacySecretSource>>,
        storage_attempts: u32,
    ) -> Fixture {
        let mut config = KeywardConfig::default();
        config.retry.storage_attempts = storage_attempts;
        let engine = Arc::new(CryptoEngine::new(SecretString::from(
            "guard-test-password".to_string(),
        )));
        let vault = Arc::new(VaultContainer::new(engine, store, &config));
        let registry = Arc::new(ProviderRegistry::new());
        let guard = ConsistencyGuard::new(vault.clone(), registry.clone(), legacy, &config);
        Fixture {
            guard,
            registry,
            vault,
        }
    }

    fn memory_fixture() -> Fixture {
        fixture(Arc::new(MemoryDocumentStore::new()), None, 3)
    }

    #[tokio::test(start_paused = true)]
    async fn registry_cache_is_the_fast_path() {
        let f = memory_fixture();
        f.registry
            .record_secret("openai", SecretString::from("sk-cached".to_string()));

        let resolution = f.guard.resolve("openai").await;
        assert!(matches!(resolution, Resolution::Cached(_)));
        assert_eq!(resolution.secret().unwrap().expose_secret(), "sk-cached");
        assert_eq!(f.vault.stats().cache_misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_refetch_repopulates_registry() {
        let f = memory_fixture();
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.registry.restore("openai", AUTHENTICATED);

        let resolution = f.guard.resolve("openai").await;
        assert_eq!(resolution.rung(), Some(RecoveryRung::ImmediateRefetch));
        assert_eq!(
            f.registry.cached_secret("openai").unwrap().expose_secret(),
            "sk-openai-123456"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn two_failed_reads_then_success_reports_bounded_retry() {
        let store = Arc::new(FlakyStore::new());
        let f = fixture(store.clone(), None, 1);
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.vault.destroy();
        f.registry.restore("openai", AUTHENTICATED);

        store.fail_next_loads(2);
        let resolution = f.guard.resolve("openai").await;

        match resolution {
            Resolution::Recovered {
                secret,
                rung,
                attempts,
            } => {
                assert_eq!(secret.expose_secret(), "sk-openai-123456");
                assert_eq!(rung, RecoveryRung::BoundedRetry);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected recovery, got {other:?}"),
        }
        assert!(f.registry.belief("openai").unwrap().authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_absence_is_not_retried_or_downgraded() {
        let store = Arc::new(FlakyStore::new());
        let f = fixture(store.clone(), None, 1);

        let resolution = f.guard.resolve("openai").await;
        assert!(matches!(resolution, Resolution::Absent));
        assert_eq!(store.loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn integrity_failure_skips_retry_and_downgrades() {
        let store = Arc::new(FlakyStore::new());
        let f = fixture(store.clone(), None, 3);
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.vault.destroy();
        f.registry.restore("openai", AUTHENTICATED);

        let mut document = store.inner().load().await.unwrap().unwrap();
        document["keyward_vault"]["entries"]["openai"]["authTag"] =
            json!("AAAAAAAAAAAAAAAAAAAAAA==");
        store.inner().replace(Some(document)).await;
        store.reset_counters();

        let resolution = f.guard.resolve("openai").await;
        match resolution {
            Resolution::Downgraded { reason } => assert!(reason.contains("integrity")),
            other => panic!("expected downgrade, got {other:?}"),
        }
        assert_eq!(store.loads(), 1);
        assert_eq!(f.registry.belief("openai"), Some(CredentialBelief::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_rung_migrates_plaintext() {
        let legacy = Arc::new(MemoryLegacySource::with_secrets([(
            "openai",
            "sk-openai-legacy",
        )]));
        let f = fixture(
            Arc::new(MemoryDocumentStore::new()),
            Some(legacy.clone()),
            3,
        );
        f.registry.restore("openai", AUTHENTICATED);

        let resolution = f.guard.resolve("openai").await;
        assert_eq!(resolution.rung(), Some(RecoveryRung::LegacyMigration));
        assert_eq!(
            resolution.into_secret().unwrap().expose_secret(),
            "sk-openai-legacy"
        );
        assert!(!legacy.contains("openai").await);
        assert_eq!(f.vault.list_owners().await.unwrap(), vec!["openai"]);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupted_entry_is_rewritten_from_legacy_copy() {
        let store = MemoryDocumentStore::new();
        let legacy = Arc::new(MemoryLegacySource::with_secrets([(
            "openai",
            "sk-openai-legacy",
        )]));
        let f = fixture(Arc::new(store.clone()), Some(legacy.clone()), 3);
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.vault.destroy();
        f.registry.restore("openai", AUTHENTICATED);

        let mut document = store.load().await.unwrap().unwrap();
        document["keyward_vault"]["entries"]["openai"]["authTag"] =
            json!("AAAAAAAAAAAAAAAAAAAAAA==");
        store.replace(Some(document)).await;

        let resolution = f.guard.resolve("openai").await;
        assert_eq!(resolution.rung(), Some(RecoveryRung::LegacyMigration));
        assert_eq!(
            resolution.into_secret().unwrap().expose_secret(),
            "sk-openai-legacy"
        );
        assert!(!legacy.contains("openai").await);
        assert!(f.registry.belief("openai").unwrap().expects_secret());

        f.vault.destroy();
        let stored = f.vault.get_key("openai").await.unwrap().unwrap();
        assert_eq!(stored.expose_secret(), "sk-openai-legacy");
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_copy_survives_when_corrupted_entry_cannot_be_replaced() {
        let store = MemoryDocumentStore::new();
        // Too short to pass validation, so the rewrite is refused.
        let legacy = Arc::new(MemoryLegacySource::with_secrets([("openai", "sk-x")]));
        let f = fixture(Arc::new(store.clone()), Some(legacy.clone()), 3);
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.vault.destroy();
        f.registry.restore("openai", AUTHENTICATED);

        let mut document = store.load().await.unwrap().unwrap();
        document["keyward_vault"]["entries"]["openai"]["authTag"] =
            json!("AAAAAAAAAAAAAAAAAAAAAA==");
        store.replace(Some(document)).await;

        let resolution = f.guard.resolve("openai").await;
        assert!(matches!(resolution, Resolution::Downgraded { .. }));
        assert!(legacy.contains("openai").await);
        assert_eq!(legacy.clears(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_rung_can_be_disabled() {
        let legacy = Arc::new(MemoryLegacySource::with_secrets([(
            "openai",
            "sk-openai-legacy",
        )]));
        let mut config = KeywardConfig::default();
        config.guard.legacy_migration = false;
        let vault = Arc::new(VaultContainer::new(
            Arc::new(CryptoEngine::new(SecretString::from("pw".to_string()))),
            Arc::new(MemoryDocumentStore::new()),
            &config,
        ));
        let registry = Arc::new(ProviderRegistry::new());
        let guard = ConsistencyGuard::new(vault, registry, Some(legacy.clone()), &config);

        assert!(matches!(guard.resolve("openai").await, Resolution::Absent));
        assert_eq!(legacy.lookups(), 0);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn missing_secret_downgrades_and_logs() {
        let f = memory_fixture();
        f.registry.restore("openai", AUTHENTICATED);

        let resolution = f.guard.resolve("openai").await;
        assert!(matches!(resolution, Resolution::Downgraded { .. }));
        assert!(!f.registry.belief("openai").unwrap().expects_secret());
        assert!(logs_contain("registry state downgraded"));
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_all_resolves_every_owner() {
        let f = memory_fixture();
        f.vault.store_key("anthropic", "sk-anthropic-1234").await.unwrap();
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.vault.destroy();
        for owner in ["anthropic", "openai", "mistral"] {
            f.registry.restore(owner, AUTHENTICATED);
        }

        let results = f.guard.reconcile_all().await;
        let summary: Vec<(&str, bool)> = results
            .iter()
            .map(|(owner, r)| (owner.as_str(), r.secret().is_some()))
            .collect();
        assert_eq!(
            summary,
            vec![("anthropic", true), ("mistral", false), ("openai", true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn diagnose_is_read_only() {
        let legacy = Arc::new(MemoryLegacySource::with_secrets([(
            "mistral",
            "sk-mistral-legacy",
        )]));
        let f = fixture(
            Arc::new(MemoryDocumentStore::new()),
            Some(legacy.clone()),
            3,
        );
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.registry.restore("anthropic", AUTHENTICATED);

        let anthropic = f.guard.diagnose("anthropic").await;
        assert_eq!(anthropic.issues.len(), 1);
        assert!(anthropic.issues[0].contains("no entry"));

        let openai = f.guard.diagnose("openai").await;
        assert!(openai.issues[0].contains("does not know"));

        let mistral = f.guard.diagnose("mistral").await;
        assert!(mistral.issues[0].contains("plaintext"));

        // Nothing was repaired.
        assert!(f.registry.belief("anthropic").unwrap().authenticated);
        assert!(f.registry.cached_secret("openai").is_none());
        assert!(legacy.contains("mistral").await);
        assert_eq!(legacy.clears(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn diagnose_distinguishes_corrupted_from_missing() {
        let store = MemoryDocumentStore::new();
        let f = fixture(Arc::new(store.clone()), None, 3);
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.registry.restore("openai", AUTHENTICATED);
        let mut document = store.load().await.unwrap().unwrap();
        document["keyward_vault"]["entries"]["openai"]["ciphertext"] = json!("AAAA");
        store.replace(Some(document)).await;

        let diagnosis = f.guard.diagnose("openai").await;
        assert!(!diagnosis.is_consistent());
        assert!(diagnosis.issues[0].contains("corrupted"));
    }

    #[tokio::test(start_paused = true)]
    async fn consistent_owner_has_no_issues() {
        let f = memory_fixture();
        f.vault.store_key("openai", "sk-openai-123456").await.unwrap();
        f.registry
            .record_secret("openai", SecretString::from("sk-openai-123456".to_string()));
        assert!(f.guard.diagnose("openai").await.is_consistent());
    }
}
