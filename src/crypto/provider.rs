//! The set of crypto building blocks the key orchestrator relies on.
//!
//! `Primitives` is the seam between orchestration and cryptography:
//! the orchestrator only ever calls these methods, so tests and other
//! runtimes can swap the implementation without touching the logic.

use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use zeroize::Zeroizing;

use super::envelope::{self, Identity};
use super::kdf::{self, Argon2Params};
use super::keys::{ConfirmationHash, MasterKey, WrappingKey, KEY_LEN};
use super::encryption;
use crate::errors::{RepoKeyError, Result};

/// Crypto operations used by the key orchestrator.
pub trait Primitives {
    /// Generate a brand-new random master key.
    fn generate_master_key(&self) -> Result<MasterKey>;

    /// Generate a random salt for a passphrase entry.
    fn generate_salt(&self) -> Result<Vec<u8>>;

    /// Argon2 parameters for factors created from now on.
    fn argon2_params(&self) -> Argon2Params;

    /// Derive the wrapping key and confirmation hash for a passphrase.
    ///
    /// `params` are the ones recorded with the factor, not necessarily
    /// the currently configured ones.
    fn derive_key(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        params: &Argon2Params,
    ) -> Result<(WrappingKey, ConfirmationHash)>;

    /// Seal `payload` with a symmetric wrapping key.
    fn wrap(&self, wrapping_key: &WrappingKey, payload: &[u8]) -> Result<Vec<u8>>;

    /// Reverse `wrap`.
    fn unwrap(&self, wrapping_key: &WrappingKey, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// Seal `payload` for the holder of `recipient_id`'s private key.
    fn asymmetric_wrap(&self, payload: &[u8], recipient_id: &str) -> Result<Vec<u8>>;

    /// Open a blob with whatever private key material is locally available.
    ///
    /// Returns the payload and the id of the recipient whose key opened it.
    fn asymmetric_unwrap(&self, blob: &[u8]) -> Result<(Zeroizing<Vec<u8>>, String)>;
}

/// Default primitives: Argon2id/HKDF, AES-256-GCM and X25519 sealed boxes.
pub struct DefaultPrimitives {
    argon2_params: Argon2Params,
    identities: Vec<Identity>,
}

impl DefaultPrimitives {
    /// Primitives with no local identities (asymmetric unwrap always fails).
    pub fn new(argon2_params: Argon2Params) -> Self {
        Self {
            argon2_params,
            identities: Vec::new(),
        }
    }

    /// Primitives that can unwrap blobs sealed to any of `identities`.
    pub fn with_identities(argon2_params: Argon2Params, identities: Vec<Identity>) -> Self {
        Self {
            argon2_params,
            identities,
        }
    }

    /// Load identities from a directory.
    pub fn load(argon2_params: Argon2Params, identities_dir: &Path) -> Result<Self> {
        let identities = envelope::load_identities(identities_dir)?;
        Ok(Self::with_identities(argon2_params, identities))
    }
}

impl Primitives for DefaultPrimitives {
    fn generate_master_key(&self) -> Result<MasterKey> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.try_fill_bytes(bytes.as_mut()).map_err(|e| {
            RepoKeyError::primitive("Error generating the master key", format!("OS RNG: {e}"))
        })?;
        Ok(MasterKey::new(*bytes))
    }

    fn generate_salt(&self) -> Result<Vec<u8>> {
        kdf::generate_salt()
    }

    fn argon2_params(&self) -> Argon2Params {
        self.argon2_params
    }

    fn derive_key(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        params: &Argon2Params,
    ) -> Result<(WrappingKey, ConfirmationHash)> {
        kdf::derive_key(passphrase, salt, params)
    }

    fn wrap(&self, wrapping_key: &WrappingKey, payload: &[u8]) -> Result<Vec<u8>> {
        encryption::wrap(wrapping_key.as_bytes(), payload)
    }

    fn unwrap(&self, wrapping_key: &WrappingKey, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        encryption::unwrap(wrapping_key.as_bytes(), blob)
    }

    fn asymmetric_wrap(&self, payload: &[u8], recipient_id: &str) -> Result<Vec<u8>> {
        envelope::seal(payload, recipient_id)
    }

    fn asymmetric_unwrap(&self, blob: &[u8]) -> Result<(Zeroizing<Vec<u8>>, String)> {
        self.identities
            .iter()
            .find_map(|identity| identity.open(blob).map(|p| (p, identity.recipient_id())))
            .ok_or_else(|| {
                RepoKeyError::primitive(
                    "Error decrypting the master key",
                    "no local identity can open this key",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn passphrase_wrap_roundtrip() {
        let primitives = DefaultPrimitives::new(fast());
        let master = primitives.generate_master_key().unwrap();
        let salt = primitives.generate_salt().unwrap();

        let (key, _) = primitives.derive_key(b"correct horse", &salt, &fast()).unwrap();
        let blob = primitives.wrap(&key, master.as_bytes()).unwrap();

        let (again, _) = primitives.derive_key(b"correct horse", &salt, &fast()).unwrap();
        let payload = primitives.unwrap(&again, &blob).unwrap();
        assert_eq!(MasterKey::from_slice(&payload).unwrap(), master);
    }

    #[test]
    fn derivation_follows_the_given_params() {
        let primitives = DefaultPrimitives::new(fast());
        let salt = primitives.generate_salt().unwrap();
        let slower = Argon2Params {
            iterations: 2,
            ..fast()
        };

        let (_, a) = primitives.derive_key(b"pw", &salt, &fast()).unwrap();
        let (_, b) = primitives.derive_key(b"pw", &salt, &slower).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(primitives.argon2_params(), fast());
    }

    #[test]
    fn master_keys_are_random() {
        let primitives = DefaultPrimitives::new(fast());
        let a = primitives.generate_master_key().unwrap();
        let b = primitives.generate_master_key().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn asymmetric_unwrap_reports_recipient() {
        let identity = Identity::generate();
        let id = identity.recipient_id();
        let primitives = DefaultPrimitives::with_identities(fast(), vec![identity]);

        let blob = primitives.asymmetric_wrap(b"payload", &id).unwrap();
        let (payload, recipient) = primitives.asymmetric_unwrap(&blob).unwrap();
        assert_eq!(payload.as_slice(), b"payload");
        assert_eq!(recipient, id);
    }

    #[test]
    fn asymmetric_unwrap_without_identities_fails() {
        let sender = DefaultPrimitives::new(fast());
        let blob = sender
            .asymmetric_wrap(b"payload", &Identity::generate().recipient_id())
            .unwrap();
        assert!(sender.asymmetric_unwrap(&blob).is_err());
    }
}
