// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keyward credential vault.
//!
//! This crate provides the error type, the shared types, and the traits at
//! the boundary with the host application: the persistence primitive, the
//! legacy plaintext location, and the caller's credential registry.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KeywardError;
pub use traits::{CredentialRegistry, DocumentStore, LegacySecretSource};
pub use types::{copy_secret, CredentialBelief, HealthStatus, VerificationStage};
