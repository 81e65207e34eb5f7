// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moving plaintext secrets from a legacy location into the vault.
//!
//! Migration is idempotent: the legacy copy is cleared only after the vault
//! holds a decryptable entry for the owner. A decryptable entry is never
//! overwritten; a corrupted one is replaced by the legacy copy.

use keyward_core::{KeywardError, LegacySecretSource};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::vault::{EntryStatus, VaultContainer};

/// What [`migrate_legacy_secret`] did for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Encrypted into the vault; the legacy copy was cleared.
    Migrated,
    /// The vault already had a decryptable entry; only the legacy copy was
    /// cleared.
    AlreadyInVault,
    /// The vault entry could not be decrypted and was replaced by the legacy
    /// copy, which was then cleared.
    Repaired,
    /// No plaintext secret at the legacy location.
    NotFound,
}

/// Report of what a bulk migration did.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Owners whose secret was moved into the vault, including corrupted
    /// entries rewritten from the legacy copy.
    pub migrated: Vec<String>,
    /// Owners already in the vault (skipped).
    pub skipped: Vec<String>,
    /// Non-fatal problems, one per owner that could not be migrated.
    pub warnings: Vec<String>,
}

/// Migrate one owner's legacy plaintext secret.
pub async fn migrate_legacy_secret(
    vault: &VaultContainer,
    legacy: &dyn LegacySecretSource,
    owner: &str,
) -> Result<MigrationOutcome, KeywardError> {
    let Some(secret) = legacy.lookup(owner).await? else {
        return Ok(MigrationOutcome::NotFound);
    };

    let outcome = match vault.inspect(owner).await? {
        EntryStatus::Present { .. } => MigrationOutcome::AlreadyInVault,
        EntryStatus::Absent => {
            vault.store_key(owner, secret.expose_secret()).await?;
            warn!(owner = %owner, "migrated plaintext secret from legacy location to vault");
            MigrationOutcome::Migrated
        }
        EntryStatus::Corrupted { reason } => {
            vault.store_key(owner, secret.expose_secret()).await?;
            warn!(
                owner = %owner,
                reason = %reason,
                "replaced corrupted vault entry with plaintext secret from legacy location"
            );
            MigrationOutcome::Repaired
        }
    };

    if let Err(e) = legacy.clear(owner).await {
        warn!(
            owner = %owner,
            error = %e,
            "secret is in the vault but the legacy copy could not be cleared; it will be retried on next migration"
        );
    }
    Ok(outcome)
}

/// Migrate every owner the legacy source knows about.
pub async fn migrate_legacy_secrets(
    vault: &VaultContainer,
    legacy: &dyn LegacySecretSource,
) -> Result<MigrationReport, KeywardError> {
    let mut report = MigrationReport::default();
    let owners = legacy.owners().await?;
    if owners.is_empty() {
        info!("no legacy plaintext secrets found -- nothing to migrate");
        return Ok(report);
    }

    for owner in owners {
        match migrate_legacy_secret(vault, legacy, &owner).await {
            Ok(MigrationOutcome::Migrated | MigrationOutcome::Repaired) => {
                report.migrated.push(owner)
            }
            Ok(MigrationOutcome::AlreadyInVault) => report.skipped.push(owner),
            Ok(MigrationOutcome::NotFound) => {}
            Err(e) => {
                let warning = format!("failed to migrate `{owner}`: {e}");
                warn!("{}", warning);
                report.warnings.push(warning);
            }
        }
    }

    info!(
        migrated = report.migrated.len(),
        skipped = report.skipped.len(),
        warnings = report.warnings.len(),
        "legacy secret migration finished"
    );
    Ok(report)
}
