// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consistency guard for the Keyward credential vault.
//!
//! Callers keep their own view of each credential (a registry of flags and
//! already-decrypted secrets). The guard keeps that view honest: whenever the
//! caller's belief and the vault disagree it runs a recovery ladder, and when
//! nothing can produce the secret it downgrades the belief instead of letting
//! the caller act on a credential that no longer exists.

pub mod guard;
pub mod health;
pub mod registry;

pub use guard::{ConsistencyGuard, Diagnosis, RecoveryRung, Resolution};
pub use health::{HealthLevel, HealthReport};
pub use registry::ProviderRegistry;
