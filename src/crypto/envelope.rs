//! Public-key wrapping of the master key.
//!
//! Uses an ephemeral X25519 key exchange + XSalsa20-Poly1305 (a sealed
//! box), so anyone holding a recipient's public key can wrap the master
//! key, and only the matching secret key can unwrap it.
//!
//! A recipient is identified by the lowercase hex of its 32-byte public
//! key. Identities (secret keys) live as one JSON file per recipient in
//! the identities directory.
//!
//! Blob layout:
//!   [ 32-byte ephemeral public key | 24-byte nonce | ciphertext + tag ]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{RepoKeyError, Result};

const PUBLIC_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// A local X25519 key pair able to unwrap blobs sealed to it.
///
/// The secret key zeroes itself on drop (handled by `crypto_box`).
pub struct Identity {
    secret: SecretKey,
    public: PublicKey,
}

impl Identity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild an identity from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The recipient id others use to wrap keys for this identity.
    pub fn recipient_id(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Try to open a sealed blob with this identity's secret key.
    pub fn open(&self, blob: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        if blob.len() < PUBLIC_KEY_LEN + NONCE_LEN {
            return None;
        }
        let (epk_bytes, rest) = blob.split_at(PUBLIC_KEY_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let mut epk = [0u8; PUBLIC_KEY_LEN];
        epk.copy_from_slice(epk_bytes);
        let salsa_box = SalsaBox::new(&PublicKey::from(epk), &self.secret);

        salsa_box
            .decrypt(crypto_box::Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()
            .map(Zeroizing::new)
    }
}

/// Parse a recipient id (hex public key, any case) into a public key.
pub fn parse_recipient(recipient_id: &str) -> Result<PublicKey> {
    let bytes = hex::decode(recipient_id.trim()).map_err(|e| {
        RepoKeyError::primitive(
            "Error encrypting the master key for the recipient",
            format!("recipient id is not hex: {e}"),
        )
    })?;
    let array: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        RepoKeyError::primitive(
            "Error encrypting the master key for the recipient",
            format!(
                "recipient id must be {} hex characters, got {}",
                PUBLIC_KEY_LEN * 2,
                recipient_id.len()
            ),
        )
    })?;
    Ok(PublicKey::from(array))
}

/// Seal `payload` so only the holder of `recipient_id`'s secret key can open it.
///
/// A new ephemeral key pair is generated for every call.
pub fn seal(payload: &[u8], recipient_id: &str) -> Result<Vec<u8>> {
    let recipient = parse_recipient(recipient_id)?;

    let ephemeral = SecretKey::generate(&mut OsRng);
    let ephemeral_pk = ephemeral.public_key();
    let salsa_box = SalsaBox::new(&recipient, &ephemeral);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce), payload)
        .map_err(|e| {
            RepoKeyError::primitive(
                "Error encrypting the master key for the recipient",
                format!("seal failed: {e}"),
            )
        })?;

    let mut blob = Vec::with_capacity(PUBLIC_KEY_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(ephemeral_pk.as_bytes());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

// ---------------------------------------------------------------------------
// Identity files
// ---------------------------------------------------------------------------

/// On-disk form of an identity.
#[derive(Serialize, Deserialize)]
struct IdentityFile {
    recipient_id: String,
    secret_key: String,
}

/// Write a new identity into `dir` as `<recipient_id>.json`.
///
/// The file is created owner-only (0o600) in the same call that checks it
/// does not already exist, so the secret is never readable by others and
/// an existing identity is never replaced.
pub fn save_identity(dir: &Path, identity: &Identity) -> Result<PathBuf> {
    let recipient_id = identity.recipient_id();
    let path = dir.join(format!("{recipient_id}.json"));

    fs::create_dir_all(dir).map_err(|e| {
        RepoKeyError::IdentityError(format!("cannot create identities directory: {e}"))
    })?;

    let secret_bytes = Zeroizing::new(identity.secret.to_bytes());
    let file = IdentityFile {
        recipient_id,
        secret_key: BASE64.encode(secret_bytes.as_ref()),
    };
    let json = Zeroizing::new(
        serde_json::to_vec_pretty(&file)
            .map_err(|e| RepoKeyError::SerializationError(format!("identity: {e}")))?,
    );

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut out = options.open(&path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => {
            RepoKeyError::IdentityError(format!("identity already exists at {}", path.display()))
        }
        _ => RepoKeyError::IdentityError(format!("failed to create identity: {e}")),
    })?;
    out.write_all(json.as_slice())
        .map_err(|e| RepoKeyError::IdentityError(format!("failed to write identity: {e}")))?;

    Ok(path)
}

/// Load every identity in `dir`.
///
/// A missing directory means "no identities", not an error. Files that
/// fail to parse are skipped with a warning.
pub fn load_identities(dir: &Path) -> Result<Vec<Identity>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut identities = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_identity_file(&path) {
            Ok(identity) => identities.push(identity),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping identity file"),
        }
    }

    tracing::debug!(count = identities.len(), "loaded identities");
    Ok(identities)
}

fn load_identity_file(path: &Path) -> Result<Identity> {
    let data = Zeroizing::new(fs::read(path)?);
    let file: IdentityFile = serde_json::from_slice(&data)
        .map_err(|e| RepoKeyError::IdentityError(format!("bad identity JSON: {e}")))?;
    let raw = Zeroizing::new(
        BASE64
            .decode(&file.secret_key)
            .map_err(|e| RepoKeyError::IdentityError(format!("bad secret key encoding: {e}")))?,
    );
    let bytes: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| RepoKeyError::IdentityError("secret key must be 32 bytes".into()))?;
    Ok(Identity::from_secret_bytes(bytes))
}
