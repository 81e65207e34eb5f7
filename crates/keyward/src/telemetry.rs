// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber setup for hosts that do not install their own.

use keyward_config::model::LoggingConfig;
use keyward_core::KeywardError;
use tracing_subscriber::EnvFilter;

/// Default filter directive: Keyward crates at `level`, everything else at
/// `warn`.
pub fn default_directive(level: &str) -> String {
    format!("keyward={level},warn")
}

/// Install a global `fmt` subscriber. `RUST_LOG` overrides the configured
/// level. Fails if a global subscriber is already set.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), KeywardError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&logging.level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| KeywardError::Internal(format!("failed to install tracing subscriber: {e}")))
}
