// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyward: an encrypted, self-verifying credential vault.
//!
//! [`Keyward`] wires the pieces together for a host application:
//!
//! - a [`CryptoEngine`] keyed by a master password derived from the
//!   application id and a device fingerprint (recomputed on every start),
//! - a [`VaultContainer`] persisting encrypted blobs in the host's document
//!   store and verifying every write,
//! - a [`ConsistencyGuard`] keeping the host's credential registry in step
//!   with the vault.
//!
//! ```no_run
//! # async fn run() -> Result<(), keyward_core::KeywardError> {
//! use std::sync::Arc;
//!
//! use keyward::{Keyward, ProviderRegistry};
//! use keyward_config::KeywardConfig;
//!
//! let keyward = Keyward::open(KeywardConfig::default(), Arc::new(ProviderRegistry::new())).await?;
//! keyward.store_key("openai", "sk-...").await?;
//! let secret = keyward.get_key("openai").await;
//! keyward.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod telemetry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use keyward_config::model::KeywardConfig;
use keyward_config::validation::validate_config;
use keyward_core::{copy_secret, CredentialRegistry, DocumentStore, KeywardError, LegacySecretSource};
use secrecy::SecretString;
use tracing::{info, warn};

pub use keyward_core::{CredentialBelief, HealthStatus};
pub use keyward_guard::{
    ConsistencyGuard, Diagnosis, HealthLevel, HealthReport, ProviderRegistry, RecoveryRung,
    Resolution,
};
pub use keyward_vault::{
    CryptoEngine, DeviceFingerprint, IntegrityReport, MigrationReport, SecretMetadata,
    VaultContainer, VaultStats,
};

use keyward_vault::{
    derive_master_password, migrate_legacy_secrets, DocumentLegacySource, TomlLegacySource,
};

/// The assembled credential vault.
///
/// Dropping it cancels every cache timer; [`Keyward::shutdown`] does the
/// same explicitly.
pub struct Keyward {
    config: KeywardConfig,
    vault: Arc<VaultContainer>,
    guard: ConsistencyGuard,
    registry: Arc<dyn CredentialRegistry>,
    legacy: Option<Arc<dyn LegacySecretSource>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Keyward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyward")
            .field("vault", &self.vault)
            .field("legacy", &self.legacy.is_some())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

impl Keyward {
    /// Open the storage backend and legacy location named by `config`, then
    /// [`start`](Self::start).
    ///
    /// The legacy location is the TOML file at `guard.legacy_config_path`
    /// when set, otherwise the `guard.legacy_document_key` of the host
    /// document.
    pub async fn open(
        config: KeywardConfig,
        registry: Arc<dyn CredentialRegistry>,
    ) -> Result<Self, KeywardError> {
        let store = keyward_storage::open_document_store(&config.storage).await?;
        let legacy: Arc<dyn LegacySecretSource> = match &config.guard.legacy_config_path {
            Some(path) => Arc::new(TomlLegacySource::new(path)),
            None => Arc::new(DocumentLegacySource::new(
                Arc::clone(&store),
                config.guard.legacy_document_key.clone(),
            )),
        };
        Self::start(config, store, Some(legacy), registry).await
    }

    /// Build the vault over `store`.
    ///
    /// Fails fast when the configuration is invalid or the crypto self-test
    /// does not pass. The integrity sweep that follows is diagnostic only:
    /// its findings are logged and never prevent startup.
    pub async fn start(
        config: KeywardConfig,
        store: Arc<dyn DocumentStore>,
        legacy: Option<Arc<dyn LegacySecretSource>>,
        registry: Arc<dyn CredentialRegistry>,
    ) -> Result<Self, KeywardError> {
        validate_config(&config).map_err(|errors| {
            KeywardError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let fingerprint = match &config.identity.device_fingerprint {
            Some(pinned) => DeviceFingerprint::pinned(pinned),
            None => DeviceFingerprint::collect(config.identity.fingerprint_bucket_days),
        };
        let password = derive_master_password(&config.identity.app_id, fingerprint.as_str());
        let engine = CryptoEngine::with_iterations(password, config.vault.kdf_iterations)?;
        if !engine.self_test() {
            return Err(KeywardError::Crypto(
                "crypto self-test failed: platform primitives unavailable".to_string(),
            ));
        }

        let vault = Arc::new(VaultContainer::new(Arc::new(engine), store, &config));
        let report = vault.perform_integrity_check().await;
        if report.success {
            info!(owners = report.owners.len(), "vault opened");
        } else {
            for issue in &report.issues {
                warn!(owner = ?issue.owner, kind = %issue.kind, message = %issue.message, "vault integrity issue");
            }
        }

        let guard = ConsistencyGuard::new(
            Arc::clone(&vault),
            Arc::clone(&registry),
            legacy.clone(),
            &config,
        );
        Ok(Self {
            config,
            vault,
            guard,
            registry,
            legacy,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Encrypt and persist a secret, then record it in the registry.
    pub async fn store_key(&self, owner: &str, plaintext: &str) -> Result<(), KeywardError> {
        self.vault.store_key(owner, plaintext).await?;
        self.registry
            .record_secret(owner, SecretString::from(plaintext.to_owned()));
        Ok(())
    }

    /// The secret for `owner`, recovered through the guard if needed.
    ///
    /// "No key" and "key exists but is corrupted" both come back as `None`
    /// here; use [`Self::diagnose`] or [`Self::perform_integrity_check`] to
    /// tell them apart.
    pub async fn get_key(&self, owner: &str) -> Option<SecretString> {
        self.guard.resolve(owner).await.into_secret()
    }

    pub async fn has_key(&self, owner: &str) -> Result<bool, KeywardError> {
        self.vault.has_key(owner).await
    }

    /// Remove the secret and downgrade the registry. Idempotent.
    pub async fn remove_key(&self, owner: &str) -> Result<bool, KeywardError> {
        let removed = self.vault.remove_key(owner).await?;
        self.registry.downgrade(owner);
        Ok(removed)
    }

    pub async fn list_owners(&self) -> Result<Vec<String>, KeywardError> {
        self.vault.list_owners().await
    }

    pub async fn get_metadata(&self, owner: &str) -> Result<Option<SecretMetadata>, KeywardError> {
        self.vault.get_metadata(owner).await
    }

    pub async fn perform_integrity_check(&self) -> IntegrityReport {
        self.vault.perform_integrity_check().await
    }

    pub async fn resolve(&self, owner: &str) -> Resolution {
        self.guard.resolve(owner).await
    }

    pub async fn reconcile_all(&self) -> Vec<(String, Resolution)> {
        self.guard.reconcile_all().await
    }

    pub async fn diagnose(&self, owner: &str) -> Diagnosis {
        self.guard.diagnose(owner).await
    }

    pub async fn aggregate_health(&self) -> HealthReport {
        self.guard.aggregate_health().await
    }

    /// [`Self::aggregate_health`] as the shared health status.
    pub async fn health_status(&self) -> HealthStatus {
        HealthStatus::from(&self.aggregate_health().await)
    }

    /// Move every plaintext secret from the legacy location into the vault.
    pub async fn migrate_legacy(&self) -> Result<MigrationReport, KeywardError> {
        let Some(legacy) = &self.legacy else {
            return Ok(MigrationReport::default());
        };
        let report = migrate_legacy_secrets(&self.vault, legacy.as_ref()).await?;
        for owner in &report.migrated {
            if let Ok(Some(secret)) = self.vault.get_key(owner).await {
                self.registry.record_secret(owner, copy_secret(&secret));
            }
        }
        Ok(report)
    }

    /// Record that the host authenticated upstream with `owner`'s secret.
    pub fn mark_authenticated(&self, owner: &str) {
        self.registry.mark_authenticated(owner);
    }

    pub fn stats(&self) -> VaultStats {
        self.vault.stats()
    }

    pub fn config(&self) -> &KeywardConfig {
        &self.config
    }

    pub fn vault(&self) -> &Arc<VaultContainer> {
        &self.vault
    }

    pub fn guard(&self) -> &ConsistencyGuard {
        &self.guard
    }

    /// Clear the plaintext cache and cancel every timer. Idempotent.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.vault.destroy();
            info!("keyward shut down");
        }
    }
}

impl Drop for Keyward {
    fn drop(&mut self) {
        self.shutdown();
    }
}
