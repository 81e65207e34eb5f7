// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable encrypted key-value store.
//!
//! The container is stored under one key of the host document and is
//! read-modify-written as a whole. No lock is held across
//! load → mutate → persist → verify: two concurrent writers to different
//! owners can lose an update, and post-write verification reports that as a
//! [`KeywardError::PersistenceIntegrity`] failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use keyward_config::model::KeywardConfig;
use keyward_core::{copy_secret, DocumentStore, KeywardError, VerificationStage};
use keyward_resilience::{retry, RetryPolicy};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::cache::SecretCache;
use crate::container::{missing_fields, parse_entry, VaultDataContainer};
use crate::crypto::{CryptoEngine, EncryptedBlob};

/// Characters of plaintext shown by [`SecretMetadata::key_prefix`].
const KEY_PREFIX_CHARS: usize = 6;

/// Snapshot of the instrumentation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub decryptions: u64,
    pub encryptions: u64,
    pub container_loads: u64,
    pub container_saves: u64,
    /// Most recent cache-miss read, when access tracking is on.
    pub last_access: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    decryptions: AtomicU64,
    encryptions: AtomicU64,
    container_loads: AtomicU64,
    container_saves: AtomicU64,
    /// Milliseconds since the epoch; `0` means no read since the last write.
    pending_access_ms: AtomicI64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> VaultStats {
        VaultStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            decryptions: self.decryptions.load(Ordering::Relaxed),
            encryptions: self.encryptions.load(Ordering::Relaxed),
            container_loads: self.container_loads.load(Ordering::Relaxed),
            container_saves: self.container_saves.load(Ordering::Relaxed),
            last_access: self.pending_access(),
        }
    }

    fn pending_access(&self) -> Option<DateTime<Utc>> {
        match self.pending_access_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

/// Display-safe facts about a stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretMetadata {
    pub owner: String,
    /// When the blob was encrypted, if recorded.
    pub created: Option<DateTime<Utc>>,
    /// First few plaintext characters followed by `...`.
    pub key_prefix: String,
    pub algorithm: String,
}

/// What the container holds for one owner, checked without caching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Absent,
    Present { created: Option<DateTime<Utc>> },
    Corrupted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// The host document could not be loaded at all.
    StorageUnavailable,
    /// The container header is not parseable.
    ContainerMalformed,
    MissingFields,
    AlgorithmMismatch,
    DecryptFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    /// `None` for container-level issues.
    pub owner: Option<String>,
    pub kind: IssueKind,
    pub message: String,
}

/// Result of [`VaultContainer::perform_integrity_check`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub success: bool,
    pub issues: Vec<IntegrityIssue>,
    /// Owners whose entry decrypted cleanly.
    pub owners: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Encrypted secrets persisted in a host document, with a plaintext TTL cache.
///
/// Per-owner lifecycle: `Absent → Stored → (Cached ⇄ Evicted) → Removed`.
pub struct VaultContainer {
    engine: Arc<CryptoEngine>,
    store: Arc<dyn DocumentStore>,
    document_key: String,
    min_secret_length: usize,
    verify_delay: std::time::Duration,
    track_access: bool,
    storage_retry: RetryPolicy,
    cache: SecretCache,
    counters: Counters,
}

impl std::fmt::Debug for VaultContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultContainer")
            .field("store", &self.store.name())
            .field("document_key", &self.document_key)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl VaultContainer {
    pub fn new(
        engine: Arc<CryptoEngine>,
        store: Arc<dyn DocumentStore>,
        config: &KeywardConfig,
    ) -> Self {
        Self {
            engine,
            store,
            document_key: config.vault.document_key.clone(),
            min_secret_length: config.vault.min_secret_length,
            verify_delay: config.vault.verify_delay(),
            track_access: config.vault.track_access,
            storage_retry: RetryPolicy::linear(
                config.retry.storage_attempts,
                std::time::Duration::from_millis(config.retry.storage_backoff_ms),
            ),
            cache: SecretCache::new(config.cache.ttl()),
            counters: Counters::default(),
        }
    }

    /// Encrypt, persist, verify, then cache a secret.
    ///
    /// Verification runs three passes after the write: an immediate reload
    /// checking the entry is present and unchanged, a decrypt-and-compare of
    /// the reloaded entry, and a second reload after a short delay. Any
    /// failing pass is a [`KeywardError::PersistenceIntegrity`] naming it.
    pub async fn store_key(&self, owner: &str, plaintext: &str) -> Result<(), KeywardError> {
        validate_owner(owner)?;
        if plaintext.chars().count() < self.min_secret_length {
            return Err(KeywardError::Input(format!(
                "secret must be at least {} characters",
                self.min_secret_length
            ))
            .for_owner(owner));
        }

        let blob = self.encrypt(plaintext).map_err(|e| e.for_owner(owner))?;
        let round_trip = self.decrypt(&blob).map_err(|e| e.for_owner(owner))?;
        if round_trip.expose_secret() != plaintext {
            return Err(KeywardError::Integrity(
                "round-trip decrypt did not reproduce the plaintext".to_string(),
            )
            .for_owner(owner));
        }

        let (mut document, mut container) =
            self.load_strict().await.map_err(|e| e.for_owner(owner))?;
        container.insert(owner, &blob)?;
        container.touch();
        self.counters.pending_access_ms.store(0, Ordering::Relaxed);
        self.persist(&mut document, &container)
            .await
            .map_err(|e| e.for_owner(owner))?;

        self.verify_persisted(owner, &blob, plaintext).await?;

        self.cache
            .insert(owner, SecretString::from(plaintext.to_owned()));
        info!(owner = %owner, "secret stored in vault");
        Ok(())
    }

    /// The plaintext for `owner`, or `None` when no entry exists.
    ///
    /// A corrupted or unsupported entry is an error wrapped with the owner
    /// id, never `None`.
    pub async fn get_key(&self, owner: &str) -> Result<Option<SecretString>, KeywardError> {
        validate_owner(owner)?;
        if let Some(secret) = self.cache.get(owner) {
            Counters::bump(&self.counters.cache_hits);
            return Ok(Some(secret));
        }
        Counters::bump(&self.counters.cache_misses);

        let (_, container) = self.load_lenient().await;
        let Some(entry) = container.entry(owner) else {
            return Ok(None);
        };
        let blob = entry.map_err(|e| e.for_owner(owner))?;
        let secret = self.decrypt(&blob).map_err(|e| e.for_owner(owner))?;
        self.cache.insert(owner, copy_secret(&secret));

        // Reads never write the document; the next mutation persists this.
        if self.track_access {
            self.counters
                .pending_access_ms
                .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        }
        debug!(owner = %owner, "secret decrypted from vault");
        Ok(Some(secret))
    }

    /// Whether an entry exists for `owner` (cached or persisted).
    pub async fn has_key(&self, owner: &str) -> Result<bool, KeywardError> {
        validate_owner(owner)?;
        if self.cache.contains(owner) {
            return Ok(true);
        }
        let (_, container) = self.load_lenient().await;
        Ok(container.contains(owner))
    }

    /// Remove `owner`'s entry and cache slot. Returns whether an entry
    /// existed; removing an absent owner is a no-op.
    pub async fn remove_key(&self, owner: &str) -> Result<bool, KeywardError> {
        validate_owner(owner)?;
        self.cache.remove(owner);
        let (mut document, mut container) =
            self.load_strict().await.map_err(|e| e.for_owner(owner))?;
        if !container.remove(owner) {
            return Ok(false);
        }
        if let Some(accessed) = self.counters.pending_access() {
            container.last_accessed = accessed;
            self.counters.pending_access_ms.store(0, Ordering::Relaxed);
        }
        self.persist(&mut document, &container)
            .await
            .map_err(|e| e.for_owner(owner))?;
        info!(owner = %owner, "secret removed from vault");
        Ok(true)
    }

    /// Every owner with an entry, sorted.
    pub async fn list_owners(&self) -> Result<Vec<String>, KeywardError> {
        let (_, container) = self.load_lenient().await;
        Ok(container.owners())
    }

    /// Creation time and masked prefix, from a transient decrypt that is
    /// never cached.
    pub async fn get_metadata(&self, owner: &str) -> Result<Option<SecretMetadata>, KeywardError> {
        validate_owner(owner)?;
        let (_, container) = self.load_lenient().await;
        let Some(entry) = container.entry(owner) else {
            return Ok(None);
        };
        let blob = entry.map_err(|e| e.for_owner(owner))?;
        let plaintext = self.decrypt(&blob).map_err(|e| e.for_owner(owner))?;
        Ok(Some(SecretMetadata {
            owner: owner.to_string(),
            created: blob.created,
            key_prefix: key_prefix(plaintext.expose_secret()),
            algorithm: blob.algorithm,
        }))
    }

    /// Decrypt every entry and report what is wrong. Never fails.
    pub async fn perform_integrity_check(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        let document = match self.load_document().await {
            Ok(document) => document,
            Err(e) => {
                report.issues.push(IntegrityIssue {
                    owner: None,
                    kind: IssueKind::StorageUnavailable,
                    message: e.to_string(),
                });
                report
                    .recommendations
                    .push("check that the persistence backend is reachable".to_string());
                return report;
            }
        };
        let container = match document.get(&self.document_key) {
            None => VaultDataContainer::default(),
            Some(value) => match VaultDataContainer::from_value(value.clone()) {
                Ok(container) => container,
                Err(e) => {
                    report.issues.push(IntegrityIssue {
                        owner: None,
                        kind: IssueKind::ContainerMalformed,
                        message: e.to_string(),
                    });
                    report.recommendations.push(
                        "the vault container is unreadable; re-enter every credential"
                            .to_string(),
                    );
                    return report;
                }
            },
        };

        for (owner, raw) in &container.entries {
            let outcome = parse_entry(raw).and_then(|blob| self.decrypt(&blob).map(|_| ()));
            let Err(e) = outcome else {
                report.owners.push(owner.clone());
                continue;
            };
            let kind = if !missing_fields(raw).is_empty() {
                IssueKind::MissingFields
            } else if e.is_unsupported_format() {
                IssueKind::AlgorithmMismatch
            } else {
                IssueKind::DecryptFailure
            };
            report.recommendations.push(recommendation(kind, owner));
            report.issues.push(IntegrityIssue {
                owner: Some(owner.clone()),
                kind,
                message: e.to_string(),
            });
        }

        report.success = report.issues.is_empty();
        if report.success {
            debug!(owners = report.owners.len(), "vault integrity check passed");
        } else {
            warn!(
                issues = report.issues.len(),
                verified = report.owners.len(),
                "vault integrity check found issues"
            );
        }
        report
    }

    /// Check one owner's entry without touching the cache.
    pub async fn inspect(&self, owner: &str) -> Result<EntryStatus, KeywardError> {
        validate_owner(owner)?;
        let (_, container) = self.load_strict().await.map_err(|e| e.for_owner(owner))?;
        let Some(entry) = container.entry(owner) else {
            return Ok(EntryStatus::Absent);
        };
        let status = match entry.and_then(|blob| self.decrypt(&blob).map(|_| blob.created)) {
            Ok(created) => EntryStatus::Present { created },
            Err(e) => EntryStatus::Corrupted {
                reason: e.to_string(),
            },
        };
        Ok(status)
    }

    /// Drop `owner` from the plaintext cache only.
    pub fn evict(&self, owner: &str) -> bool {
        self.cache.remove(owner)
    }

    pub fn is_cached(&self, owner: &str) -> bool {
        self.cache.contains(owner)
    }

    /// Number of pending cache expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.cache.pending_timers()
    }

    pub fn stats(&self) -> VaultStats {
        self.counters.snapshot()
    }

    /// Clear the plaintext cache and cancel every expiry timer.
    pub fn destroy(&self) {
        let evicted = self.cache.clear();
        debug!(evicted, "vault cache destroyed");
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedBlob, KeywardError> {
        Counters::bump(&self.counters.encryptions);
        self.engine.encrypt(plaintext)
    }

    fn decrypt(&self, blob: &EncryptedBlob) -> Result<SecretString, KeywardError> {
        Counters::bump(&self.counters.decryptions);
        self.engine.decrypt(blob)
    }

    async fn verify_persisted(
        &self,
        owner: &str,
        written: &EncryptedBlob,
        plaintext: &str,
    ) -> Result<(), KeywardError> {
        let fail = |stage: VerificationStage, message: String| {
            warn!(owner = %owner, %stage, %message, "post-write verification failed");
            KeywardError::PersistenceIntegrity {
                owner: owner.to_string(),
                stage,
                message,
            }
        };

        let reloaded = self
            .reload_entry(owner, written)
            .await
            .map_err(|message| fail(VerificationStage::Presence, message))?;

        match self.decrypt(&reloaded) {
            Ok(secret) if secret.expose_secret() == plaintext => {}
            Ok(_) => {
                return Err(fail(
                    VerificationStage::Decrypt,
                    "reloaded entry decrypts to a different secret".to_string(),
                ));
            }
            Err(e) => return Err(fail(VerificationStage::Decrypt, e.to_string())),
        }

        tokio::time::sleep(self.verify_delay).await;
        self.reload_entry(owner, written)
            .await
            .map_err(|message| fail(VerificationStage::Durability, message))?;
        Ok(())
    }

    /// Reload the container and return `owner`'s entry if it still equals
    /// `written`.
    async fn reload_entry(&self, owner: &str, written: &EncryptedBlob) -> Result<EncryptedBlob, String> {
        let (_, container) = self.load_strict().await.map_err(|e| e.to_string())?;
        match container.entry(owner) {
            None => Err("entry missing after save".to_string()),
            Some(Err(e)) => Err(e.to_string()),
            Some(Ok(blob)) if blob != *written => {
                Err("entry differs from the blob just written".to_string())
            }
            Some(Ok(blob)) => Ok(blob),
        }
    }

    /// Load the host document with retries. A missing document is an empty
    /// object.
    async fn load_document(&self) -> Result<serde_json::Value, KeywardError> {
        Counters::bump(&self.counters.container_loads);
        let store = Arc::clone(&self.store);
        let loaded = retry(
            &self.storage_retry,
            "vault.load",
            KeywardError::is_transient,
            move |_| {
                let store = Arc::clone(&store);
                async move { store.load().await }
            },
        )
        .await
        .map_err(exhausted)?;

        match loaded.value {
            None => Ok(serde_json::Value::Object(serde_json::Map::new())),
            Some(document @ serde_json::Value::Object(_)) => Ok(document),
            Some(_) => Err(KeywardError::Integrity(
                "host document is not a JSON object".to_string(),
            )),
        }
    }

    /// Load for mutation: any failure is an error, so a corrupt or
    /// unreadable container is never overwritten.
    async fn load_strict(&self) -> Result<(serde_json::Value, VaultDataContainer), KeywardError> {
        let document = self.load_document().await?;
        let container = match document.get(&self.document_key) {
            None => VaultDataContainer::default(),
            Some(value) => VaultDataContainer::from_value(value.clone())?,
        };
        Ok((document, container))
    }

    /// Load for reading: failures degrade to an empty container.
    async fn load_lenient(&self) -> (serde_json::Value, VaultDataContainer) {
        match self.load_strict().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "vault load failed, reading as empty");
                (
                    serde_json::Value::Object(serde_json::Map::new()),
                    VaultDataContainer::default(),
                )
            }
        }
    }

    async fn persist(
        &self,
        document: &mut serde_json::Value,
        container: &VaultDataContainer,
    ) -> Result<(), KeywardError> {
        let serde_json::Value::Object(fields) = document else {
            return Err(KeywardError::Internal(
                "host document is not a JSON object".to_string(),
            ));
        };
        fields.insert(self.document_key.clone(), container.to_value()?);

        Counters::bump(&self.counters.container_saves);
        let store = Arc::clone(&self.store);
        let snapshot = Arc::new(document.clone());
        retry(
            &self.storage_retry,
            "vault.save",
            KeywardError::is_transient,
            move |_| {
                let store = Arc::clone(&store);
                let snapshot = Arc::clone(&snapshot);
                async move { store.save(&snapshot).await }
            },
        )
        .await
        .map_err(exhausted)?;
        Ok(())
    }
}

impl Drop for VaultContainer {
    fn drop(&mut self) {
        self.cache.clear();
    }
}

/// Mask a secret value for display: `sk-ant...` format.
///
/// Values shorter than twice the prefix length are fully masked as `****`.
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() < KEY_PREFIX_CHARS * 2 {
        return "****".to_string();
    }
    key_prefix(value)
}

fn key_prefix(plaintext: &str) -> String {
    let prefix: String = plaintext.chars().take(KEY_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

fn validate_owner(owner: &str) -> Result<(), KeywardError> {
    if owner.trim().is_empty() {
        return Err(KeywardError::Input("owner id must not be empty".to_string()));
    }
    Ok(())
}

fn exhausted(e: keyward_resilience::RetryExhausted<KeywardError>) -> KeywardError {
    if e.last_error.is_transient() {
        KeywardError::TransientStorage {
            attempts: e.attempts,
            source: Box::new(e.last_error),
        }
    } else {
        e.last_error
    }
}

fn recommendation(kind: IssueKind, owner: &str) -> String {
    match kind {
        IssueKind::MissingFields => {
            format!("entry `{owner}` is incomplete; remove it and store the credential again")
        }
        IssueKind::AlgorithmMismatch => {
            format!("entry `{owner}` uses an unsupported format; store the credential again")
        }
        IssueKind::DecryptFailure => format!(
            "entry `{owner}` cannot be decrypted; the device identity may have changed or the \
             data was modified. Store the credential again"
        ),
        IssueKind::StorageUnavailable | IssueKind::ContainerMalformed => {
            "re-enter every credential".to_string()
        }
    }
}
