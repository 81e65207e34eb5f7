// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration parsing, overrides and validation.

use keyward_config::diagnostic::{suggest_key, ConfigError};
use keyward_config::model::{KeywardConfig, StorageBackend, MIN_KDF_ITERATIONS};
use keyward_config::{load_and_validate_str, load_config_from_str, render_errors};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_keyward_config() {
    let toml = r#"
[identity]
app_id = "desk-assistant"
device_fingerprint = "laptop-7"
fingerprint_bucket_days = 30

[vault]
document_key = "secrets"
kdf_iterations = 250000
min_secret_length = 12
verify_delay_ms = 50
track_access = false

[cache]
ttl_secs = 60

[retry]
storage_attempts = 5
storage_backoff_ms = 10
recovery_attempts = 2
recovery_backoff_ms = 100

[guard]
legacy_migration = false
legacy_document_key = "settings"
legacy_config_path = "/tmp/providers.toml"

[storage]
backend = "memory"
database_path = "/tmp/keyward.db"
document_name = "desk"

[logging]
level = "debug"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should pass");

    assert_eq!(config.identity.app_id, "desk-assistant");
    assert_eq!(config.identity.device_fingerprint.as_deref(), Some("laptop-7"));
    assert_eq!(config.identity.fingerprint_bucket_days, 30);
    assert_eq!(config.vault.document_key, "secrets");
    assert_eq!(config.vault.kdf_iterations, 250_000);
    assert_eq!(config.vault.min_secret_length, 12);
    assert!(!config.vault.track_access);
    assert_eq!(config.cache.ttl().as_secs(), 60);
    assert_eq!(config.retry.storage_attempts, 5);
    assert_eq!(config.retry.recovery_backoff_ms, 100);
    assert!(!config.guard.legacy_migration);
    assert_eq!(config.guard.legacy_config_path.as_deref(), Some("/tmp/providers.toml"));
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.storage.document_name, "desk");
    assert_eq!(config.logging.level, "debug");
}

/// An unknown key inside a section is rejected.
#[test]
fn unknown_key_in_vault_section_is_rejected() {
    let toml = r#"
[vault]
kdf_iteration = 200000
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("kdf_iteration"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unknown keys surface as diagnostics carrying the closest valid key.
#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[cache]
ttl_sec = 30
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { key, suggestion, .. } => Some((key, suggestion)),
            _ => None,
        })
        .expect("an unknown key diagnostic");

    assert_eq!(unknown.0, "ttl_sec");
    assert_eq!(unknown.1.as_deref(), Some("ttl_secs"));

    let rendered = render_errors(&errors);
    assert!(rendered.contains("ttl_secs"), "rendered: {rendered}");
}

/// A value of the wrong type is reported against its key.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[retry]
storage_attempts = "three"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string attempts");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "expected InvalidType, got: {errors:?}"
    );
}

/// Misspellings resolve to the intended key; unrelated words do not.
#[test]
fn suggest_key_finds_close_matches_only() {
    let keys = ["document_key", "kdf_iterations", "min_secret_length"];

    assert_eq!(
        suggest_key("kdf_iteratons", &keys).as_deref(),
        Some("kdf_iterations")
    );
    assert_eq!(
        suggest_key("documentkey", &keys).as_deref(),
        Some("document_key")
    );
    assert!(suggest_key("zzz", &keys).is_none());
}

/// A KDF below the floor is a validation error, not a parse error.
#[test]
fn weak_kdf_iterations_fail_validation() {
    let toml = r#"
[vault]
kdf_iterations = 10000
"#;

    load_config_from_str(toml).expect("weak KDF still parses");
    let errors = load_and_validate_str(toml).expect_err("weak KDF should fail validation");

    assert_eq!(errors.len(), 1);
    let message = errors[0].to_string();
    assert!(message.contains("kdf_iterations"), "got: {message}");
    assert!(message.contains(&MIN_KDF_ITERATIONS.to_string()), "got: {message}");
}

/// Validation collects every problem instead of stopping at the first.
#[test]
fn validation_reports_all_errors_at_once() {
    let toml = r#"
[vault]
document_key = "shared"

[retry]
storage_attempts = 0
recovery_attempts = 50

[guard]
legacy_document_key = "shared"

[logging]
level = "loud"
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();

    assert!(messages.iter().any(|m| m.contains("retry.storage_attempts")));
    assert!(messages.iter().any(|m| m.contains("retry.recovery_attempts")));
    assert!(messages.iter().any(|m| m.contains("must differ")));
    assert!(messages.iter().any(|m| m.contains("logging.level")));
    assert_eq!(messages.len(), 4, "got: {messages:?}");
}

/// An empty document key would collide with the host's own settings.
#[test]
fn empty_document_key_fails_validation() {
    let toml = r#"
[vault]
document_key = "  "
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("vault.document_key must not be empty"))
    );
}

/// The memory backend does not need a database path.
#[test]
fn memory_backend_ignores_database_path() {
    let toml = r#"
[storage]
backend = "memory"
database_path = ""
"#;

    let config = load_and_validate_str(toml).expect("memory backend needs no path");
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_and_validate_str("").expect("empty TOML should use defaults");

    assert_eq!(config.identity.app_id, "keyward");
    assert!(config.identity.device_fingerprint.is_none());
    assert_eq!(config.vault.document_key, "keyward_vault");
    assert_eq!(config.vault.kdf_iterations, MIN_KDF_ITERATIONS);
    assert_eq!(config.vault.min_secret_length, 8);
    assert_eq!(config.vault.verify_delay().as_millis(), 100);
    assert!(config.vault.track_access);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.retry.storage_attempts, 3);
    assert_eq!(config.retry.recovery_attempts, 3);
    assert!(config.guard.legacy_migration);
    assert_eq!(config.guard.legacy_document_key, "providers");
    assert!(config.guard.legacy_config_path.is_none());
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.storage.database_path.ends_with("keyward.db"));
    assert_eq!(config.logging.level, "info");
}

/// Dotted overrides land on the nested field, the way env vars are merged.
#[test]
fn dotted_override_sets_nested_field() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[cache]
ttl_secs = 120
"#;

    let config: KeywardConfig = Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("cache.ttl_secs", 15))
        .merge(("guard.legacy_document_key", "settings"))
        .extract()
        .expect("should merge overrides");

    assert_eq!(config.cache.ttl_secs, 15);
    assert_eq!(config.guard.legacy_document_key, "settings");
}

/// Missing config files are silently skipped.
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: KeywardConfig = Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file("/nonexistent/path/keyward.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.vault.document_key, "keyward_vault");
}

/// Defaults round-trip through TOML serialization unchanged.
#[test]
fn defaults_serialize_to_loadable_toml() {
    let rendered = toml::to_string(&KeywardConfig::default()).expect("defaults serialize");
    let config = load_and_validate_str(&rendered).expect("serialized defaults load");
    assert_eq!(config.vault.kdf_iterations, MIN_KDF_ITERATIONS);
    assert_eq!(config.cache.ttl_secs, 300);
}
