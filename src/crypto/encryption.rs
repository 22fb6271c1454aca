//! AES-256-GCM key wrapping.
//!
//! Each call to `wrap` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `unwrap` splits the nonce back out
//! before decrypting.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use crate::errors::{RepoKeyError, Result};

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Wrap `payload` with a 32-byte `key`.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn wrap(key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
        RepoKeyError::primitive(
            "Error wrapping the master key",
            format!("invalid key length: {e}"),
        )
    })?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher.encrypt(&nonce, payload).map_err(|e| {
        RepoKeyError::primitive(
            "Error wrapping the master key",
            format!("encryption error: {e}"),
        )
    })?;

    // Prepend the nonce so the caller only needs to store one blob.
    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Unwrap a blob that was produced by `wrap`.
///
/// Any failure (short blob, wrong key, tampered data) is reported the
/// same way so callers cannot tell them apart.
pub fn unwrap(key: &[u8], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let failed = || RepoKeyError::primitive("Error unwrapping the master key", "unwrap failed");

    if blob.len() < NONCE_LEN {
        return Err(failed());
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| failed())?;

    let payload = cipher.decrypt(nonce, ciphertext).map_err(|_| failed())?;

    Ok(Zeroizing::new(payload))
}
