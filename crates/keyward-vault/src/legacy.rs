// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext locations used before secrets were encrypted.
//!
//! Both sources only ever remove the secret itself on `clear`; the rest of the
//! owner's settings stay where they are.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use keyward_core::{DocumentStore, KeywardError, LegacySecretSource};
use secrecy::SecretString;
use tracing::info;

const DOCUMENT_SECRET_FIELD: &str = "apiKey";
const TOML_PROVIDERS_TABLE: &str = "providers";
const TOML_SECRET_FIELD: &str = "api_key";

/// `{ownerId: {apiKey: "..."}}` stored under a key of the host document.
pub struct DocumentLegacySource {
    store: Arc<dyn DocumentStore>,
    key: String,
}

impl DocumentLegacySource {
    pub fn new(store: Arc<dyn DocumentStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    async fn providers(&self) -> Result<Option<serde_json::Value>, KeywardError> {
        Ok(self
            .store
            .load()
            .await?
            .and_then(|mut document| document.get_mut(&self.key).map(serde_json::Value::take)))
    }
}

#[async_trait]
impl LegacySecretSource for DocumentLegacySource {
    async fn lookup(&self, owner: &str) -> Result<Option<SecretString>, KeywardError> {
        let Some(providers) = self.providers().await? else {
            return Ok(None);
        };
        Ok(providers
            .get(owner)
            .and_then(|entry| entry.get(DOCUMENT_SECRET_FIELD))
            .and_then(serde_json::Value::as_str)
            .filter(|secret| !secret.is_empty())
            .map(|secret| SecretString::from(secret.to_owned())))
    }

    async fn clear(&self, owner: &str) -> Result<(), KeywardError> {
        let Some(mut document) = self.store.load().await? else {
            return Ok(());
        };
        let removed = document
            .get_mut(&self.key)
            .and_then(|providers| providers.get_mut(owner))
            .and_then(serde_json::Value::as_object_mut)
            .and_then(|entry| entry.remove(DOCUMENT_SECRET_FIELD))
            .is_some();
        if removed {
            self.store.save(&document).await?;
            info!(owner = %owner, key = %self.key, "legacy plaintext secret cleared");
        }
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<String>, KeywardError> {
        let Some(serde_json::Value::Object(providers)) = self.providers().await? else {
            return Ok(Vec::new());
        };
        Ok(providers
            .into_iter()
            .filter(|(_, entry)| {
                entry
                    .get(DOCUMENT_SECRET_FIELD)
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|secret| !secret.is_empty())
            })
            .map(|(owner, _)| owner)
            .collect())
    }
}

/// `[providers.<owner>] api_key = "..."` in a TOML config file.
///
/// A missing file holds no secrets.
#[derive(Debug, Clone)]
pub struct TomlLegacySource {
    path: PathBuf,
}

impl TomlLegacySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<toml::Table>, KeywardError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KeywardError::Storage { source: Box::new(e) }),
        };
        toml::from_str(&content).map(Some).map_err(|e| {
            KeywardError::Config(format!(
                "legacy config {} is not valid TOML: {e}",
                self.path.display()
            ))
        })
    }

    fn secret_of<'a>(table: &'a toml::Table, owner: &str) -> Option<&'a str> {
        table
            .get(TOML_PROVIDERS_TABLE)?
            .get(owner)?
            .get(TOML_SECRET_FIELD)?
            .as_str()
            .filter(|secret| !secret.is_empty())
    }
}

#[async_trait]
impl LegacySecretSource for TomlLegacySource {
    async fn lookup(&self, owner: &str) -> Result<Option<SecretString>, KeywardError> {
        let Some(table) = self.read()? else {
            return Ok(None);
        };
        Ok(Self::secret_of(&table, owner).map(|secret| SecretString::from(secret.to_owned())))
    }

    async fn clear(&self, owner: &str) -> Result<(), KeywardError> {
        let Some(mut table) = self.read()? else {
            return Ok(());
        };
        let removed = table
            .get_mut(TOML_PROVIDERS_TABLE)
            .and_then(|providers| providers.get_mut(owner))
            .and_then(toml::Value::as_table_mut)
            .and_then(|entry| entry.remove(TOML_SECRET_FIELD))
            .is_some();
        if !removed {
            return Ok(());
        }

        let content = toml::to_string_pretty(&table)
            .map_err(|e| KeywardError::Internal(format!("failed to render TOML: {e}")))?;
        std::fs::write(&self.path, content)
            .map_err(|e| KeywardError::Storage { source: Box::new(e) })?;
        info!(owner = %owner, path = %self.path.display(), "legacy config rewritten without plaintext secret");
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<String>, KeywardError> {
        let Some(table) = self.read()? else {
            return Ok(Vec::new());
        };
        let Some(providers) = table
            .get(TOML_PROVIDERS_TABLE)
            .and_then(toml::Value::as_table)
        else {
            return Ok(Vec::new());
        };
        Ok(providers
            .keys()
            .filter(|owner| Self::secret_of(&table, owner).is_some())
            .cloned()
            .collect())
    }
}
