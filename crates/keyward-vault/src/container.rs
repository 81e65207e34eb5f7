// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk vault container format.
//!
//! Entries are kept as raw JSON and parsed one at a time, so a single
//! malformed entry never prevents access to the others.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keyward_core::KeywardError;
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedBlob;

pub const CONTAINER_VERSION: u32 = 1;

/// Fields every entry must carry to be considered a blob.
const REQUIRED_FIELDS: [&str; 6] = [
    "ciphertext",
    "iv",
    "salt",
    "authTag",
    "algorithm",
    "keyDerivation",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDataContainer {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<String, serde_json::Value>,
}

fn default_version() -> u32 {
    CONTAINER_VERSION
}

impl Default for VaultDataContainer {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: CONTAINER_VERSION,
            created: now,
            last_accessed: now,
            entries: BTreeMap::new(),
        }
    }
}

impl VaultDataContainer {
    /// Parse the container header. Entries stay unparsed.
    pub fn from_value(value: serde_json::Value) -> Result<Self, KeywardError> {
        serde_json::from_value(value)
            .map_err(|e| KeywardError::Integrity(format!("vault container is malformed: {e}")))
    }

    pub fn to_value(&self) -> Result<serde_json::Value, KeywardError> {
        serde_json::to_value(self)
            .map_err(|e| KeywardError::Internal(format!("failed to serialize vault container: {e}")))
    }

    /// The parsed blob for `owner`, or `None` when absent.
    pub fn entry(&self, owner: &str) -> Option<Result<EncryptedBlob, KeywardError>> {
        self.entries.get(owner).map(parse_entry)
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.entries.contains_key(owner)
    }

    pub fn insert(&mut self, owner: &str, blob: &EncryptedBlob) -> Result<(), KeywardError> {
        let value = serde_json::to_value(blob)
            .map_err(|e| KeywardError::Internal(format!("failed to serialize blob: {e}")))?;
        self.entries.insert(owner.to_string(), value);
        Ok(())
    }

    /// Remove `owner`. Returns whether it was present.
    pub fn remove(&mut self, owner: &str) -> bool {
        self.entries.remove(owner).is_some()
    }

    /// Owner ids in sorted order.
    pub fn owners(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

/// Required blob fields absent from a raw entry. A non-object lacks all.
pub fn missing_fields(value: &serde_json::Value) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value.get(field).is_none())
        .collect()
}

/// Parse one raw entry, naming any missing fields.
pub fn parse_entry(value: &serde_json::Value) -> Result<EncryptedBlob, KeywardError> {
    if !value.is_object() {
        return Err(KeywardError::Integrity("entry is not an object".to_string()));
    }
    let missing = missing_fields(value);
    if !missing.is_empty() {
        return Err(KeywardError::Integrity(format!(
            "entry is missing fields: {}",
            missing.join(", ")
        )));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| KeywardError::Integrity(format!("entry is malformed: {e}")))
}
