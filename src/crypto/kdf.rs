//! Passphrase-based key derivation using Argon2id + HKDF-SHA256.
//!
//! Argon2id turns `(passphrase, salt)` into a 32-byte root secret.
//! HKDF then expands that root into two independent outputs:
//! the `WrappingKey` that seals the master key, and the
//! `ConfirmationHash` stored next to it so a wrong passphrase can be
//! rejected without attempting an unwrap.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{ConfirmationHash, WrappingKey, KEY_LEN};
use crate::errors::{RepoKeyError, Result};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the confirmation hash in bytes.
pub const CONFIRMATION_HASH_LEN: usize = 32;

/// HKDF context for the wrapping key.
const WRAPPING_KEY_INFO: &[u8] = b"repokey-wrapping-key";

/// HKDF context for the confirmation hash.
const CONFIRMATION_HASH_INFO: &[u8] = b"repokey-confirmation-hash";

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so the CLI can pass
/// whatever the user configured in `.repokey.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// Reject settings below the safety floor.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(RepoKeyError::primitive(
                "Error deriving the wrapping key",
                format!(
                    "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                    self.memory_kib
                ),
            ));
        }
        if self.iterations < 1 {
            return Err(RepoKeyError::primitive(
                "Error deriving the wrapping key",
                "Argon2 iterations must be at least 1",
            ));
        }
        if self.parallelism < 1 {
            return Err(RepoKeyError::primitive(
                "Error deriving the wrapping key",
                "Argon2 parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Derive `(WrappingKey, ConfirmationHash)` from a passphrase and salt.
///
/// The same passphrase + salt + params always produce the same pair.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<(WrappingKey, ConfirmationHash)> {
    argon2_params.validate()?;

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| {
        RepoKeyError::primitive(
            "Error deriving the wrapping key",
            format!("invalid Argon2 params: {e}"),
        )
    })?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut root = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, root.as_mut())
        .map_err(|e| {
            RepoKeyError::primitive(
                "Error deriving the wrapping key",
                format!("Argon2id hashing failed: {e}"),
            )
        })?;

    // The root already has full entropy, so HKDF runs expand-only.
    let hk = Hkdf::<Sha256>::new(None, root.as_ref());

    let mut wrapping = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(WRAPPING_KEY_INFO, wrapping.as_mut())
        .map_err(|e| {
            RepoKeyError::primitive(
                "Error deriving the wrapping key",
                format!("HKDF expand failed: {e}"),
            )
        })?;

    let mut confirmation = vec![0u8; CONFIRMATION_HASH_LEN];
    hk.expand(CONFIRMATION_HASH_INFO, &mut confirmation)
        .map_err(|e| {
            RepoKeyError::primitive(
                "Error deriving the wrapping key",
                format!("HKDF expand failed: {e}"),
            )
        })?;

    Ok((
        WrappingKey::new(*wrapping),
        ConfirmationHash::new(confirmation),
    ))
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt).map_err(|e| {
        RepoKeyError::primitive("Error generating a new salt", format!("OS RNG: {e}"))
    })?;
    Ok(salt)
}
