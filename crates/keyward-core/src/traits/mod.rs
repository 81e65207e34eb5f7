// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the collaborators the vault talks to.
//!
//! The host application supplies the persistence primitive, optionally a
//! legacy plaintext location, and the registry that holds its own belief
//! about which credentials are usable.

pub mod legacy;
pub mod registry;
pub mod storage;

pub use legacy::LegacySecretSource;
pub use registry::CredentialRegistry;
pub use storage::DocumentStore;
