//! Secret key newtypes.
//!
//! `MasterKey` is the symmetric secret that decrypts a repository.
//! `WrappingKey` and `ConfirmationHash` are derived together from a
//! passphrase and a salt: the first seals the master key, the second
//! lets a candidate passphrase be rejected before any unwrap is tried.
//!
//! All three zero their memory on drop and compare in constant time.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{RepoKeyError, Result};

/// Length of the master key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
///
/// The master key only ever exists in memory; on disk it is always
/// wrapped by one of the repository's unlock factors.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Rebuild a master key from an unwrapped payload.
    ///
    /// Fails if the payload is not exactly `KEY_LEN` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            RepoKeyError::primitive(
                "Error unwrapping the master key",
                format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self::new(array))
    }

    /// Access the raw key bytes (e.g. to pass to a wrap primitive).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Key used to wrap and unwrap the master key for one passphrase entry.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey {
    bytes: [u8; KEY_LEN],
}

impl WrappingKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WrappingKey(<redacted>)")
    }
}

/// Non-secret verifier derived alongside a `WrappingKey`.
///
/// Stored in the info file; compare only through `matches`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConfirmationHash {
    bytes: Vec<u8>,
}

impl ConfirmationHash {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Constant-time comparison against a stored hash.
    ///
    /// A length mismatch is a mismatch, never an error.
    pub fn matches(&self, stored: &[u8]) -> bool {
        self.bytes.as_slice().ct_eq(stored).into()
    }
}

impl fmt::Debug for ConfirmationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfirmationHash({} bytes)", self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_key_equality_is_by_value() {
        let a = MasterKey::new([0x11; KEY_LEN]);
        let b = MasterKey::new([0x11; KEY_LEN]);
        let c = MasterKey::new([0x22; KEY_LEN]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn master_key_from_slice_checks_length() {
        assert!(MasterKey::from_slice(&[0u8; KEY_LEN]).is_ok());
        let err = MasterKey::from_slice(&[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::PrimitiveFailure);
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = MasterKey::new([0xAB; KEY_LEN]);
        let shown = format!("{key:?}");
        assert!(!shown.contains("171"), "raw bytes leaked: {shown}");
        assert!(shown.contains("redacted"));
    }

    #[test]
    fn confirmation_hash_length_mismatch_is_not_a_match() {
        let hash = ConfirmationHash::new(vec![1, 2, 3, 4]);
        assert!(hash.matches(&[1, 2, 3, 4]));
        assert!(!hash.matches(&[1, 2, 3]));
        assert!(!hash.matches(&[1, 2, 3, 5]));
    }
}
