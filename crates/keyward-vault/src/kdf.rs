// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master password and per-blob key derivation.
//!
//! The master password is recomputed on every process start from the
//! application id and a device fingerprint; it is never persisted. Each blob
//! key is derived from that password and the blob's own salt with
//! PBKDF2-HMAC-SHA256.

use std::num::NonZeroU32;

use chrono::Utc;
use keyward_core::KeywardError;
use ring::digest::{self, SHA256};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::SecretString;
use zeroize::Zeroizing;

const MASTER_PASSWORD_DOMAIN: &[u8] = b"keyward.master-password.v1";
const SECONDS_PER_DAY: i64 = 86_400;

/// Derive the master password as hex-encoded
/// `SHA-256(app_id || device_fingerprint || domain tag)`.
pub fn derive_master_password(app_id: &str, device_fingerprint: &str) -> SecretString {
    let mut ctx = digest::Context::new(&SHA256);
    ctx.update(app_id.as_bytes());
    ctx.update(device_fingerprint.as_bytes());
    ctx.update(MASTER_PASSWORD_DOMAIN);
    SecretString::from(hex::encode(ctx.finish().as_ref()))
}

/// Stable, non-secret identifier of the current machine.
///
/// Built from coarse platform attributes so it survives restarts. With a
/// non-zero bucket size it also changes every `bucket_days` days, which
/// makes every existing blob undecryptable once the bucket rolls over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Collect the fingerprint of the running host.
    pub fn collect(bucket_days: u32) -> Self {
        let bucket = (bucket_days > 0)
            .then(|| Utc::now().timestamp() / (SECONDS_PER_DAY * i64::from(bucket_days)));
        Self::from_attributes(
            std::env::consts::OS,
            std::env::consts::ARCH,
            &current_locale(),
            bucket,
        )
    }

    /// Hash the given attributes into a fingerprint.
    pub fn from_attributes(os: &str, arch: &str, locale: &str, bucket: Option<i64>) -> Self {
        let mut ctx = digest::Context::new(&SHA256);
        for part in [os, arch, locale] {
            ctx.update(part.as_bytes());
            ctx.update(b"|");
        }
        if let Some(bucket) = bucket {
            ctx.update(&bucket.to_be_bytes());
        }
        Self(hex::encode(ctx.finish().as_ref()))
    }

    /// Use an operator-pinned value instead of collecting one.
    pub fn pinned(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn current_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "C".to_string())
}

/// Derive a 32-byte AES key from the master password and a blob salt.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: NonZeroU32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password,
        key.as_mut(),
    );
    key
}

/// Generate `N` random bytes from the system CSPRNG.
pub fn random_bytes<const N: usize>(rng: &SystemRandom) -> Result<[u8; N], KeywardError> {
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|_| KeywardError::Crypto("system random source unavailable".to_string()))?;
    Ok(bytes)
}
