// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the vault, the consistency guard, and their callers.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// Which post-write verification pass failed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStage {
    /// Immediate reload, checking that the entry is present and unchanged.
    Presence,
    /// Decrypting the reloaded entry and comparing it with the original plaintext.
    Decrypt,
    /// Second reload after a short delay, catching writes that were
    /// acknowledged but never became durable.
    Durability,
}

/// What a caller currently believes about one credential owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBelief {
    /// The caller thinks a secret is stored for this owner.
    pub has_secret: bool,
    /// The caller has successfully authenticated with this owner's secret.
    pub authenticated: bool,
}

impl CredentialBelief {
    /// True when the caller expects the vault to produce a secret.
    pub fn expects_secret(&self) -> bool {
        self.has_secret || self.authenticated
    }
}

/// Make an independent copy of a secret.
pub fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
