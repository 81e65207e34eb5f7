// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Keyward credential vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum PBKDF2 round count accepted anywhere in Keyward.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Maximum PBKDF2 round count accepted anywhere in Keyward. Blobs claiming
/// more are refused before any key derivation runs.
pub const MAX_KDF_ITERATIONS: u32 = 2_000_000;

/// Top-level Keyward configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeywardConfig {
    /// Application identity used to derive the master password.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Encrypted container settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Plaintext TTL cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Bounded retry settings for storage and recovery.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Consistency guard settings.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Persistence backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity inputs for master password derivation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Application identifier mixed into the master password.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Explicit device fingerprint. When unset, one is computed from coarse
    /// platform attributes on every start.
    #[serde(default)]
    pub device_fingerprint: Option<String>,

    /// Width of the timestamp bucket mixed into the computed fingerprint, in
    /// days. `0` leaves the timestamp out.
    #[serde(default)]
    pub fingerprint_bucket_days: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            device_fingerprint: None,
            fingerprint_bucket_days: 0,
        }
    }
}

fn default_app_id() -> String {
    "keyward".to_string()
}

/// Encrypted container configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Key of the container inside the host document.
    #[serde(default = "default_document_key")]
    pub document_key: String,

    /// PBKDF2-HMAC-SHA256 round count (default: 100000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Shortest plaintext accepted by `store_key`.
    #[serde(default = "default_min_secret_length")]
    pub min_secret_length: usize,

    /// Delay before the durability re-read after a write, in milliseconds.
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,

    /// Record cache-miss reads. The time is written as `lastAccessed` with
    /// the next removal; reads themselves never write the document.
    #[serde(default = "default_track_access")]
    pub track_access: bool,
}

impl VaultConfig {
    /// Delay before the durability re-read.
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            document_key: default_document_key(),
            kdf_iterations: default_kdf_iterations(),
            min_secret_length: default_min_secret_length(),
            verify_delay_ms: default_verify_delay_ms(),
            track_access: default_track_access(),
        }
    }
}

fn default_document_key() -> String {
    "keyward_vault".to_string()
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

fn default_min_secret_length() -> usize {
    8
}

fn default_verify_delay_ms() -> u64 {
    100
}

fn default_track_access() -> bool {
    true
}

/// Plaintext TTL cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Sliding expiry for cached plaintext, in seconds (default: 300).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Sliding expiry for cached plaintext.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

/// Bounded retry configuration.
///
/// Delays grow linearly: attempt `n` waits `n * backoff_ms` before retrying.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts for each document load/save.
    #[serde(default = "default_attempts")]
    pub storage_attempts: u32,

    /// Linear backoff step for storage retries, in milliseconds.
    #[serde(default = "default_storage_backoff_ms")]
    pub storage_backoff_ms: u64,

    /// Attempts for the guard's bounded re-fetch rung.
    #[serde(default = "default_attempts")]
    pub recovery_attempts: u32,

    /// Linear backoff step for the guard's re-fetch rung, in milliseconds.
    #[serde(default = "default_recovery_backoff_ms")]
    pub recovery_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            storage_attempts: default_attempts(),
            storage_backoff_ms: default_storage_backoff_ms(),
            recovery_attempts: default_attempts(),
            recovery_backoff_ms: default_recovery_backoff_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_storage_backoff_ms() -> u64 {
    25
}

fn default_recovery_backoff_ms() -> u64 {
    50
}

/// Consistency guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Consult the legacy plaintext location during recovery.
    #[serde(default = "default_legacy_migration")]
    pub legacy_migration: bool,

    /// Key of the legacy `{owner -> {apiKey}}` map inside the host document.
    #[serde(default = "default_legacy_document_key")]
    pub legacy_document_key: String,

    /// Optional TOML file holding `[providers.<owner>] api_key` entries.
    #[serde(default)]
    pub legacy_config_path: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            legacy_migration: default_legacy_migration(),
            legacy_document_key: default_legacy_document_key(),
            legacy_config_path: None,
        }
    }
}

fn default_legacy_migration() -> bool {
    true
}

fn default_legacy_document_key() -> String {
    "providers".to_string()
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single-document SQLite table.
    #[default]
    Sqlite,
    /// In-process document, lost on exit.
    Memory,
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend holds the host document.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Name of the document row inside the database.
    #[serde(default = "default_document_name")]
    pub document_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            document_name: default_document_name(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("keyward").join("keyward.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("keyward.db"))
        .display()
        .to_string()
}

fn default_document_name() -> String {
    "keyward".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
