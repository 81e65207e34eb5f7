// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keyward credential vault.

use thiserror::Error;

use crate::types::VerificationStage;

/// The primary error type used across all Keyward crates.
#[derive(Debug, Error)]
pub enum KeywardError {
    /// Rejected input (empty owner id, secret too short). Raised before any
    /// cryptographic work is done.
    #[error("invalid input: {0}")]
    Input(String),

    /// The blob carries an algorithm or key-derivation tag this engine does not
    /// support. Decryption is never attempted.
    #[error("unsupported blob format: algorithm `{algorithm}`, key derivation `{key_derivation}`")]
    UnsupportedFormat {
        algorithm: String,
        key_derivation: String,
    },

    /// Authentication tag verification failed, or the blob is structurally
    /// corrupted. Retrying with the same inputs cannot succeed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// One of the post-write verification passes failed.
    #[error("persistence verification failed for `{owner}` at {stage}: {message}")]
    PersistenceIntegrity {
        owner: String,
        stage: VerificationStage,
        message: String,
    },

    /// The persistence primitive kept failing until the retry budget ran out.
    #[error("storage unavailable after {attempts} attempt(s): {source}")]
    TransientStorage {
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Single storage backend failure (connection, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Platform crypto primitives are unavailable or misbehaving.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error scoped to a single credential owner.
    #[error("secret `{owner}`: {source}")]
    Entry {
        owner: String,
        #[source]
        source: Box<KeywardError>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeywardError {
    /// Wraps this error with the owner id it concerns.
    pub fn for_owner(self, owner: &str) -> Self {
        match self {
            already @ KeywardError::Entry { .. } => already,
            other => KeywardError::Entry {
                owner: owner.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through [`KeywardError::Entry`].
    pub fn root(&self) -> &KeywardError {
        match self {
            KeywardError::Entry { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for tag failures and structurally corrupted blobs.
    pub fn is_integrity(&self) -> bool {
        matches!(self.root(), KeywardError::Integrity(_))
    }

    /// True when the blob format is not recognized.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self.root(), KeywardError::UnsupportedFormat { .. })
    }

    /// True for failures a later attempt might not repeat.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            KeywardError::TransientStorage { .. } | KeywardError::Storage { .. }
        )
    }

    /// True for failures where retrying with the same inputs is pointless.
    pub fn is_not_retryable(&self) -> bool {
        matches!(
            self.root(),
            KeywardError::Input(_)
                | KeywardError::Integrity(_)
                | KeywardError::UnsupportedFormat { .. }
                | KeywardError::Config(_)
        )
    }
}
