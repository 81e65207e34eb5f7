// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./keyward.toml` > `~/.config/keyward/keyward.toml` > `/etc/keyward/keyward.toml`
//! with environment variable overrides via `KEYWARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KeywardConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/keyward/keyward.toml` (system-wide)
/// 3. `~/.config/keyward/keyward.toml` (user XDG config)
/// 4. `./keyward.toml` (local directory)
/// 5. `KEYWARD_*` environment variables
pub fn load_config() -> Result<KeywardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file("/etc/keyward/keyward.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("keyward/keyward.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("keyward.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `KEYWARD_VAULT_KDF_ITERATIONS` must map to `vault.kdf_iterations`,
/// not `vault.kdf.iterations`.
fn env_provider() -> Env {
    Env::prefixed("KEYWARD_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 7] = [
        "identity", "vault", "cache", "retry", "guard", "storage", "logging",
    ];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("vault_kdf_iterations"), "vault.kdf_iterations");
        assert_eq!(map_env_key("identity_app_id"), "identity.app_id");
        assert_eq!(map_env_key("retry_storage_backoff_ms"), "retry.storage_backoff_ms");
        assert_eq!(map_env_key("logging_level"), "logging.level");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("whatever_key"), "whatever_key");
    }
}
