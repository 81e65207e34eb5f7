// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Keyward integration tests.
//!
//! Provides document stores with scripted misbehavior and an in-memory legacy
//! plaintext source, enabling deterministic tests of the retry, verification,
//! and recovery paths without real flaky infrastructure.
//!
//! # Components
//!
//! - [`FlakyStore`] - fails a scripted number of loads/saves, counts calls
//! - [`UndurableStore`] - acknowledges writes that silently revert
//! - [`MemoryLegacySource`] - plaintext `{owner -> apiKey}` map with counters

pub mod flaky_store;
pub mod legacy_source;
pub mod undurable_store;

pub use flaky_store::FlakyStore;
pub use legacy_source::MemoryLegacySource;
pub use undurable_store::UndurableStore;
