//! `InfoFile` and `KeyEntry`: the repository's root key metadata.
//!
//! An `InfoFile` lists every unlock factor that can recover the master
//! key. Each factor is a `KeyEntry`: either a passphrase entry (salt,
//! confirmation hash, wrapped key) or an asymmetric entry (recipient id,
//! wrapped key).
//!
//! Version 1 files predate the key list for passphrases: they carry one
//! top-level `salt` / `confirmation_hash` pair instead, and the master
//! key is whatever that passphrase derives directly.
//!
//! Every passphrase records the Argon2 parameters it was derived with,
//! so changing the configured cost later does not lock anyone out.

use serde::{Deserialize, Serialize};

use super::format::{base64_decode, base64_decode_opt, base64_encode, base64_encode_opt};
use crate::crypto::Argon2Params;
use crate::errors::{RepoKeyError, Result};

/// Marker stored in every info file.
pub const APP_NAME: &str = "repokey";

/// Format version written by this release.
pub const CURRENT_VERSION: i32 = 3;

/// Argon2 parameters stored next to a passphrase so unlocking uses the
/// same KDF settings it was created with. Files written before these
/// were recorded fall back to the defaults (m=64MB, t=3, p=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArgon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for StoredArgon2Params {
    fn default() -> Self {
        Argon2Params::default().into()
    }
}

impl From<Argon2Params> for StoredArgon2Params {
    fn from(params: Argon2Params) -> Self {
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

impl From<StoredArgon2Params> for Argon2Params {
    fn from(stored: StoredArgon2Params) -> Self {
        Self {
            memory_kib: stored.memory_kib,
            iterations: stored.iterations,
            parallelism: stored.parallelism,
        }
    }
}

/// One unlock factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyEntry {
    /// Master key wrapped by a passphrase-derived key.
    Passphrase {
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        salt: Vec<u8>,
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        confirmation_hash: Vec<u8>,
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        wrapped_key: Vec<u8>,
        #[serde(default)]
        argon2: StoredArgon2Params,
    },

    /// Master key sealed to a recipient's public key.
    Asymmetric {
        recipient_id: String,
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        wrapped_key: Vec<u8>,
    },
}

impl KeyEntry {
    /// The wrapped master key, common to both kinds.
    pub fn wrapped_key(&self) -> &[u8] {
        match self {
            Self::Passphrase { wrapped_key, .. } | Self::Asymmetric { wrapped_key, .. } => {
                wrapped_key
            }
        }
    }

    /// Short label for logs and listings.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Passphrase { .. } => "passphrase",
            Self::Asymmetric { .. } => "asymmetric",
        }
    }

    /// True if this is an asymmetric entry for `recipient_id` (case-insensitive).
    pub fn is_recipient(&self, recipient_id: &str) -> bool {
        matches!(self, Self::Asymmetric { recipient_id: id, .. } if id.eq_ignore_ascii_case(recipient_id))
    }
}

/// Root metadata of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoFile {
    /// Always `APP_NAME`.
    pub app: String,

    /// Format version; only ever moves forward.
    pub version: i32,

    /// Unlock factors, in the order they were added.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,

    /// Version 1 passphrase salt.
    #[serde(
        rename = "salt",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    pub legacy_salt: Option<Vec<u8>>,

    /// Version 1 passphrase confirmation hash.
    #[serde(
        rename = "confirmation_hash",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    pub legacy_confirmation_hash: Option<Vec<u8>>,

    /// Argon2 parameters of the version 1 passphrase; absent means defaults.
    #[serde(rename = "argon2", default, skip_serializing_if = "Option::is_none")]
    pub legacy_argon2: Option<StoredArgon2Params>,
}

impl InfoFile {
    /// An empty info file at the current version.
    pub fn new() -> Self {
        Self {
            app: APP_NAME.to_string(),
            version: CURRENT_VERSION,
            keys: Vec::new(),
            legacy_salt: None,
            legacy_confirmation_hash: None,
            legacy_argon2: None,
        }
    }

    /// True when the version 1 passphrase fields are both populated.
    pub fn has_legacy_passphrase(&self) -> bool {
        matches!(
            (&self.legacy_salt, &self.legacy_confirmation_hash),
            (Some(s), Some(h)) if !s.is_empty() && !h.is_empty()
        )
    }

    /// Drop the version 1 passphrase fields.
    pub fn clear_legacy_passphrase(&mut self) {
        self.legacy_salt = None;
        self.legacy_confirmation_hash = None;
        self.legacy_argon2 = None;
    }

    /// Number of ways to unlock the repository, legacy passphrase included.
    pub fn factor_count(&self) -> usize {
        self.keys.len() + usize::from(self.has_legacy_passphrase())
    }

    /// Append a passphrase entry.
    pub fn add_passphrase(
        &mut self,
        salt: Vec<u8>,
        confirmation_hash: Vec<u8>,
        wrapped_key: Vec<u8>,
        argon2: StoredArgon2Params,
    ) -> Result<()> {
        if salt.is_empty() || confirmation_hash.is_empty() || wrapped_key.is_empty() {
            return Err(RepoKeyError::InvalidInfoFile(
                "passphrase entry fields must not be empty".into(),
            ));
        }
        self.keys.push(KeyEntry::Passphrase {
            salt,
            confirmation_hash,
            wrapped_key,
            argon2,
        });
        Ok(())
    }

    /// Append an asymmetric entry.
    ///
    /// Recipient ids are unique case-insensitively.
    pub fn add_asymmetric(&mut self, recipient_id: &str, wrapped_key: Vec<u8>) -> Result<()> {
        if recipient_id.is_empty() || wrapped_key.is_empty() {
            return Err(RepoKeyError::InvalidInfoFile(
                "asymmetric entry fields must not be empty".into(),
            ));
        }
        if self.has_recipient(recipient_id) {
            return Err(RepoKeyError::DuplicateFactor(
                "This key has already been added to the repository",
            ));
        }
        self.keys.push(KeyEntry::Asymmetric {
            recipient_id: recipient_id.to_string(),
            wrapped_key,
        });
        Ok(())
    }

    /// True if an asymmetric entry for `recipient_id` exists (case-insensitive).
    pub fn has_recipient(&self, recipient_id: &str) -> bool {
        self.keys.iter().any(|k| k.is_recipient(recipient_id))
    }

    /// Iterate passphrase entries with their position in `keys`.
    pub fn passphrase_entries(&self) -> impl Iterator<Item = (usize, &KeyEntry)> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| matches!(k, KeyEntry::Passphrase { .. }))
    }

    /// Iterate asymmetric entries as `(recipient_id, wrapped_key)`.
    pub fn asymmetric_entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.keys.iter().filter_map(|k| match k {
            KeyEntry::Asymmetric {
                recipient_id,
                wrapped_key,
            } => Some((recipient_id.as_str(), wrapped_key.as_slice())),
            KeyEntry::Passphrase { .. } => None,
        })
    }
}

impl Default for InfoFile {
    fn default() -> Self {
        Self::new()
    }
}
