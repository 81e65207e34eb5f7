// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope encryption with AES-256-GCM and PBKDF2-derived keys.
//!
//! Every call to [`CryptoEngine::encrypt`] draws a fresh 128-bit salt and a
//! fresh 96-bit nonce from the system CSPRNG. Nonce reuse would be
//! catastrophic for GCM security. The algorithm tag is bound to the
//! ciphertext as associated data.

use std::num::NonZeroU32;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use keyward_config::model::{MAX_KDF_ITERATIONS, MIN_KDF_ITERATIONS};
use keyward_core::KeywardError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::SystemRandom;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::kdf;

/// Algorithm tag written to and required on every blob.
pub const ALGORITHM: &str = "AES-256-GCM";
/// Key-derivation tag written to and required on every blob.
pub const KEY_DERIVATION: &str = "PBKDF2-SHA256";

const SALT_LEN: usize = 16;
const TAG_LEN: usize = 16;
const SELF_TEST_PLAINTEXT: &str = "keyward-self-test-plaintext";

/// The unit of ciphertext at rest.
///
/// Binary fields are standard base64. Field names are camelCase on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub auth_tag: String,
    pub algorithm: String,
    pub key_derivation: String,
    /// PBKDF2 round count the key was derived with.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

fn default_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

/// Password-based envelope encryption.
///
/// Holds only the master password and the iteration count; keys are derived
/// per blob and dropped (zeroized) after each operation.
pub struct CryptoEngine {
    password: SecretString,
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl std::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEngine")
            .field("password", &"[REDACTED]")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl CryptoEngine {
    /// Engine using the minimum allowed iteration count.
    pub fn new(password: SecretString) -> Self {
        Self {
            password,
            iterations: min_iterations(),
            rng: SystemRandom::new(),
        }
    }

    /// Engine with a custom iteration count, within
    /// `MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS`.
    pub fn with_iterations(password: SecretString, iterations: u32) -> Result<Self, KeywardError> {
        if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&iterations) {
            return Err(KeywardError::Config(format!(
                "PBKDF2 iterations must be between {MIN_KDF_ITERATIONS} and {MAX_KDF_ITERATIONS}, got {iterations}"
            )));
        }
        let iterations = NonZeroU32::new(iterations)
            .ok_or_else(|| KeywardError::Config("PBKDF2 iterations must be non-zero".into()))?;
        Ok(Self {
            password,
            iterations,
            rng: SystemRandom::new(),
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Seal `plaintext` into a new blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedBlob, KeywardError> {
        let salt: [u8; SALT_LEN] = kdf::random_bytes(&self.rng)?;
        let iv: [u8; NONCE_LEN] = kdf::random_bytes(&self.rng)?;
        let key = self.aead_key(&salt, self.iterations)?;

        let mut in_out = Zeroizing::new(plaintext.as_bytes().to_vec());
        let tag = key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(iv),
                Aad::from(ALGORITHM.as_bytes()),
                in_out.as_mut_slice(),
            )
            .map_err(|_| KeywardError::Crypto("AES-256-GCM encryption failed".to_string()))?;

        Ok(EncryptedBlob {
            ciphertext: STANDARD.encode(in_out.as_slice()),
            iv: STANDARD.encode(iv),
            salt: STANDARD.encode(salt),
            auth_tag: STANDARD.encode(tag.as_ref()),
            algorithm: ALGORITHM.to_string(),
            key_derivation: KEY_DERIVATION.to_string(),
            iterations: self.iterations.get(),
            created: Some(Utc::now()),
        })
    }

    /// Open a blob.
    ///
    /// Unknown tags or an iteration count outside the accepted range are
    /// [`KeywardError::UnsupportedFormat`] and no decryption is attempted.
    /// Any tag failure (tampering, wrong password) is
    /// [`KeywardError::Integrity`].
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<SecretString, KeywardError> {
        check_format(blob)?;
        let iterations = NonZeroU32::new(blob.iterations).ok_or_else(|| unsupported(blob))?;

        let salt = decode_field("salt", &blob.salt, Some(SALT_LEN))?;
        let iv = decode_field("iv", &blob.iv, Some(NONCE_LEN))?;
        let tag = decode_field("authTag", &blob.auth_tag, Some(TAG_LEN))?;
        let ciphertext = decode_field("ciphertext", &blob.ciphertext, None)?;

        let nonce = Nonce::try_assume_unique_for_key(&iv)
            .map_err(|_| KeywardError::Integrity("iv has invalid length".to_string()))?;
        let key = self.aead_key(&salt, iterations)?;

        let mut in_out = Zeroizing::new(ciphertext);
        in_out.extend_from_slice(&tag);
        let plaintext = key
            .open_in_place(nonce, Aad::from(ALGORITHM.as_bytes()), in_out.as_mut_slice())
            .map_err(|_| {
                KeywardError::Integrity(
                    "authentication tag mismatch: wrong password or tampered data".to_string(),
                )
            })?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|_| KeywardError::Integrity("decrypted secret is not UTF-8".to_string()))?;
        Ok(SecretString::from(text.to_owned()))
    }

    /// Round-trip a known plaintext. Used at startup to fail fast when the
    /// platform primitives are unusable.
    pub fn self_test(&self) -> bool {
        match self
            .encrypt(SELF_TEST_PLAINTEXT)
            .and_then(|blob| self.decrypt(&blob))
        {
            Ok(plaintext) => plaintext.expose_secret() == SELF_TEST_PLAINTEXT,
            Err(_) => false,
        }
    }

    /// Whether an engine built from `password` passes [`Self::self_test`].
    pub fn test(password: SecretString) -> bool {
        Self::new(password).self_test()
    }

    fn aead_key(&self, salt: &[u8], iterations: NonZeroU32) -> Result<LessSafeKey, KeywardError> {
        let key = kdf::derive_key(self.password.expose_secret().as_bytes(), salt, iterations);
        let unbound = UnboundKey::new(&AES_256_GCM, key.as_ref())
            .map_err(|_| KeywardError::Crypto("failed to create AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

/// Best-effort zeroization of a plaintext buffer.
pub fn secure_clear<Z: Zeroize + ?Sized>(buffer: &mut Z) {
    buffer.zeroize();
}

fn check_format(blob: &EncryptedBlob) -> Result<(), KeywardError> {
    if blob.algorithm != ALGORITHM
        || blob.key_derivation != KEY_DERIVATION
        || !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&blob.iterations)
    {
        return Err(unsupported(blob));
    }
    Ok(())
}

fn unsupported(blob: &EncryptedBlob) -> KeywardError {
    KeywardError::UnsupportedFormat {
        algorithm: blob.algorithm.clone(),
        key_derivation: format!("{} ({} iterations)", blob.key_derivation, blob.iterations),
    }
}

fn decode_field(name: &str, value: &str, len: Option<usize>) -> Result<Vec<u8>, KeywardError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| KeywardError::Integrity(format!("{name} is not valid base64: {e}")))?;
    if let Some(expected) = len
        && bytes.len() != expected
    {
        return Err(KeywardError::Integrity(format!(
            "{name} has {} bytes, expected {expected}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn min_iterations() -> NonZeroU32 {
    NonZeroU32::new(MIN_KDF_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}
