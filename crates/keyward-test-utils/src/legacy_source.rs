// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory legacy plaintext source.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use keyward_core::{KeywardError, LegacySecretSource};

/// A `{owner -> apiKey}` map standing in for a pre-encryption schema.
#[derive(Debug, Default)]
pub struct MemoryLegacySource {
    secrets: Mutex<BTreeMap<String, String>>,
    lookups: AtomicU32,
    clears: AtomicU32,
}

impl MemoryLegacySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding the given plaintext secrets.
    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: Mutex::new(
                secrets
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub async fn insert(&self, owner: &str, secret: &str) {
        self.secrets
            .lock()
            .await
            .insert(owner.to_string(), secret.to_string());
    }

    pub async fn contains(&self, owner: &str) -> bool {
        self.secrets.lock().await.contains_key(owner)
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> u32 {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegacySecretSource for MemoryLegacySource {
    async fn lookup(&self, owner: &str) -> Result<Option<SecretString>, KeywardError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .lock()
            .await
            .get(owner)
            .map(|s| SecretString::from(s.clone())))
    }

    async fn clear(&self, owner: &str) -> Result<(), KeywardError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.secrets.lock().await.remove(owner);
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<String>, KeywardError> {
        Ok(self.secrets.lock().await.keys().cloned().collect())
    }
}
