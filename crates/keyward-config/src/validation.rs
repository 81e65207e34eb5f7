// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the PBKDF2 floor, bounded retry budgets, and non-empty keys.

use crate::diagnostic::ConfigError;
use crate::model::{KeywardConfig, StorageBackend, MAX_KDF_ITERATIONS, MIN_KDF_ITERATIONS};

/// Upper bound on attempts for any retry loop.
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Upper bound on a single backoff step, in milliseconds.
const MAX_BACKOFF_MS: u64 = 1_000;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &KeywardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.identity.app_id.trim().is_empty() {
        errors.push(validation("identity.app_id must not be empty".to_string()));
    }

    if let Some(fingerprint) = &config.identity.device_fingerprint
        && fingerprint.trim().is_empty()
    {
        errors.push(validation(
            "identity.device_fingerprint must not be empty when set".to_string(),
        ));
    }

    if config.vault.document_key.trim().is_empty() {
        errors.push(validation("vault.document_key must not be empty".to_string()));
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(validation(format!(
            "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        )));
    } else if config.vault.kdf_iterations > MAX_KDF_ITERATIONS {
        errors.push(validation(format!(
            "vault.kdf_iterations must be at most {MAX_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        )));
    }

    if config.vault.min_secret_length == 0 {
        errors.push(validation(
            "vault.min_secret_length must be at least 1".to_string(),
        ));
    }

    if config.vault.verify_delay_ms > MAX_BACKOFF_MS {
        errors.push(validation(format!(
            "vault.verify_delay_ms must be at most {MAX_BACKOFF_MS}, got {}",
            config.vault.verify_delay_ms
        )));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(validation("cache.ttl_secs must be greater than 0".to_string()));
    }

    for (key, attempts) in [
        ("retry.storage_attempts", config.retry.storage_attempts),
        ("retry.recovery_attempts", config.retry.recovery_attempts),
    ] {
        if attempts == 0 || attempts > MAX_RETRY_ATTEMPTS {
            errors.push(validation(format!(
                "{key} must be between 1 and {MAX_RETRY_ATTEMPTS}, got {attempts}"
            )));
        }
    }

    for (key, backoff) in [
        ("retry.storage_backoff_ms", config.retry.storage_backoff_ms),
        ("retry.recovery_backoff_ms", config.retry.recovery_backoff_ms),
    ] {
        if backoff > MAX_BACKOFF_MS {
            errors.push(validation(format!(
                "{key} must be at most {MAX_BACKOFF_MS}, got {backoff}"
            )));
        }
    }

    if config.guard.legacy_document_key.trim().is_empty() {
        errors.push(validation(
            "guard.legacy_document_key must not be empty".to_string(),
        ));
    }

    if config.guard.legacy_document_key == config.vault.document_key {
        errors.push(validation(format!(
            "guard.legacy_document_key and vault.document_key must differ, both are `{}`",
            config.vault.document_key
        )));
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(validation(
            "storage.database_path must not be empty".to_string(),
        ));
    }

    if config.storage.document_name.trim().is_empty() {
        errors.push(validation(
            "storage.document_name must not be empty".to_string(),
        ));
    }

    if !matches!(
        config.logging.level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(validation(format!(
            "logging.level must be one of trace, debug, info, warn, error, got `{}`",
            config.logging.level
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = KeywardConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn low_kdf_iterations_fail_validation() {
        let mut config = KeywardConfig::default();
        config.vault.kdf_iterations = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "kdf_iterations"));
    }

    #[test]
    fn excessive_kdf_iterations_fail_validation() {
        let mut config = KeywardConfig::default();
        config.vault.kdf_iterations = MAX_KDF_ITERATIONS + 1;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "at most"));
    }

    #[test]
    fn unbounded_retry_fails_validation() {
        let mut config = KeywardConfig::default();
        config.retry.storage_attempts = 0;
        config.retry.recovery_attempts = 50;
        config.retry.recovery_backoff_ms = 5_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "retry.storage_attempts"));
        assert!(has_error(&errors, "retry.recovery_attempts"));
        assert!(has_error(&errors, "retry.recovery_backoff_ms"));
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let mut config = KeywardConfig::default();
        config.cache.ttl_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "cache.ttl_secs"));
    }

    #[test]
    fn colliding_document_keys_fail_validation() {
        let mut config = KeywardConfig::default();
        config.guard.legacy_document_key = config.vault.document_key.clone();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must differ"));
    }

    #[test]
    fn empty_database_path_only_matters_for_sqlite() {
        let mut config = KeywardConfig::default();
        config.storage.database_path = String::new();
        assert!(validate_config(&config).is_err());

        config.storage.backend = StorageBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = KeywardConfig::default();
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "logging.level"));
    }

    #[test]
    fn collects_all_errors_without_failing_fast() {
        let mut config = KeywardConfig::default();
        config.identity.app_id = " ".to_string();
        config.vault.document_key = String::new();
        config.cache.ttl_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
