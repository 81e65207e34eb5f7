// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted credential container for the Keyward credential vault.
//!
//! Every secret is sealed as an independent envelope: a fresh salt derives a
//! per-blob key from the master password via PBKDF2-HMAC-SHA256, and the key
//! is re-derived on every decrypt, never stored. The container lives inside
//! one JSON document of the host's persistence primitive, read-modify-written
//! as a whole and verified after each write.

pub mod cache;
pub mod container;
pub mod crypto;
pub mod kdf;
pub mod legacy;
pub mod migration;
pub mod vault;

pub use cache::SecretCache;
pub use container::VaultDataContainer;
pub use crypto::{CryptoEngine, EncryptedBlob};
pub use kdf::{derive_master_password, DeviceFingerprint};
pub use legacy::{DocumentLegacySource, TomlLegacySource};
pub use migration::{
    migrate_legacy_secret, migrate_legacy_secrets, MigrationOutcome, MigrationReport,
};
pub use vault::{
    mask_secret, EntryStatus, IntegrityIssue, IntegrityReport, IssueKind, SecretMetadata,
    VaultContainer, VaultStats,
};
