//! Master key orchestration: create, add factors, unlock, migrate.
//!
//! Every function here is stateless. The caller passes in the current
//! `InfoFile` (and master key, where needed) and gets the result back;
//! nothing is cached between calls. Crypto goes through `Primitives`,
//! passphrases come from a `PassphraseSource`.

use std::fmt;

use crate::crypto::{MasterKey, Primitives};
use crate::errors::{RepoKeyError, Result};
use crate::infofile::{InfoFile, KeyEntry, CURRENT_VERSION};
use crate::prompt::PassphraseSource;

/// Which kind of unlock factor to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorSpec {
    /// Prompt for a passphrase.
    Passphrase,
    /// Seal the master key to this recipient id.
    Recipient(String),
}

impl FactorSpec {
    /// `Recipient` when an id is given, `Passphrase` otherwise.
    pub fn from_recipient(recipient: Option<&str>) -> Self {
        match recipient {
            Some(id) if !id.is_empty() => Self::Recipient(id.to_string()),
            _ => Self::Passphrase,
        }
    }
}

/// The factor that unlocked a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorId {
    /// Asymmetric entry, by recipient id.
    Recipient(String),
    /// Passphrase entry, by position in `InfoFile::keys`.
    Passphrase(usize),
    /// The version 1 top-level passphrase.
    Legacy,
}

impl fmt::Display for FactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient(id) => write!(f, "recipient:{id}"),
            Self::Passphrase(index) => write!(f, "passphrase:{index}"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// A successfully unlocked master key and the factor that did it.
#[derive(Debug)]
pub struct Unlocked {
    pub master_key: MasterKey,
    pub factor_id: FactorId,
}

/// What `upgrade` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from_version: i32,
    pub to_version: i32,
    /// True if the legacy passphrase was re-wrapped under a new salt.
    pub rotated_passphrase: bool,
}

const UNLOCK_CONTEXT: &str = "Cannot unlock the repository";
const MIGRATE_CONTEXT: &str = "Cannot unlock the repository to migrate it";

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Create key material for a new repository.
///
/// Generates a fresh master key and an empty info file at the current
/// version, then adds `initial` as the first unlock factor.
pub fn create_repository(
    initial: &FactorSpec,
    primitives: &dyn Primitives,
    source: &mut dyn PassphraseSource,
) -> Result<(InfoFile, MasterKey)> {
    let mut info = InfoFile::new();
    let master_key = primitives.generate_master_key()?;

    add_factor(&mut info, &master_key, initial, primitives, source)?;

    tracing::info!(version = info.version, "created repository key material");
    Ok((info, master_key))
}

// ---------------------------------------------------------------------------
// Add factor
// ---------------------------------------------------------------------------

/// Add an unlock factor for `master_key` to `info`.
///
/// Fails with `DuplicateFactor` if the recipient is already present or
/// the passphrase already unlocks the repository; `info` is untouched
/// on any failure.
pub fn add_factor(
    info: &mut InfoFile,
    master_key: &MasterKey,
    factor: &FactorSpec,
    primitives: &dyn Primitives,
    source: &mut dyn PassphraseSource,
) -> Result<()> {
    match factor {
        FactorSpec::Recipient(recipient_id) => {
            add_recipient(info, master_key, recipient_id, primitives)
        }
        FactorSpec::Passphrase => {
            let passphrase = source.acquire_passphrase()?;
            add_passphrase(info, master_key, &passphrase, primitives)
        }
    }
}

fn add_recipient(
    info: &mut InfoFile,
    master_key: &MasterKey,
    recipient_id: &str,
    primitives: &dyn Primitives,
) -> Result<()> {
    if info.has_recipient(recipient_id) {
        return Err(RepoKeyError::DuplicateFactor(
            "This key has already been added to the repository",
        ));
    }

    let wrapped = primitives.asymmetric_wrap(master_key.as_bytes(), recipient_id)?;
    info.add_asymmetric(recipient_id, wrapped)?;

    tracing::info!(keys = info.keys.len(), "added asymmetric unlock factor");
    Ok(())
}

fn add_passphrase(
    info: &mut InfoFile,
    master_key: &MasterKey,
    passphrase: &str,
    primitives: &dyn Primitives,
) -> Result<()> {
    // A passphrase that already works would just be a redundant entry.
    match unlock_with_passphrase(info, passphrase, primitives) {
        Ok(_) => {
            return Err(RepoKeyError::DuplicateFactor(
                "This passphrase has already been added to the repository",
            ))
        }
        Err(RepoKeyError::InvalidCredentials { .. }) => {}
        Err(e) => return Err(e),
    }

    let salt = primitives.generate_salt()?;
    let params = primitives.argon2_params();
    let (wrapping_key, confirmation_hash) =
        primitives.derive_key(passphrase.as_bytes(), &salt, &params)?;
    let wrapped = primitives.wrap(&wrapping_key, master_key.as_bytes())?;

    info.add_passphrase(
        salt,
        confirmation_hash.as_bytes().to_vec(),
        wrapped,
        params.into(),
    )?;

    tracing::info!(keys = info.keys.len(), "added passphrase unlock factor");
    Ok(())
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

/// Recover the master key using whatever factor works.
///
/// Asymmetric entries are tried first, in list order, since they need
/// no input. Otherwise a passphrase is acquired exactly once and tried
/// against every passphrase entry. Failure is always the same
/// `InvalidCredentials`, whatever was tried.
pub fn unlock(
    info: &InfoFile,
    primitives: &dyn Primitives,
    source: &mut dyn PassphraseSource,
) -> Result<Unlocked> {
    if let Some(unlocked) = try_asymmetric(info, primitives) {
        return Ok(unlocked);
    }

    let passphrase = source.acquire_passphrase()?;
    unlock_with_passphrase(info, &passphrase, primitives)
}

fn try_asymmetric(info: &InfoFile, primitives: &dyn Primitives) -> Option<Unlocked> {
    for (recipient_id, wrapped_key) in info.asymmetric_entries() {
        let Ok((payload, _)) = primitives.asymmetric_unwrap(wrapped_key) else {
            continue;
        };
        match MasterKey::from_slice(&payload) {
            Ok(master_key) => {
                tracing::debug!("unlocked with asymmetric factor");
                return Some(Unlocked {
                    master_key,
                    factor_id: FactorId::Recipient(recipient_id.to_string()),
                });
            }
            Err(e) => tracing::debug!(error = %e, "asymmetric entry held a malformed key"),
        }
    }
    None
}

/// Recover the master key with a known passphrase.
///
/// For each passphrase entry the confirmation hash is checked in
/// constant time first, using the Argon2 parameters stored with that
/// entry; only a match leads to an unwrap. Once the hash matches the
/// passphrase is known to be right, so an unwrap failure means damaged
/// key material and is returned as is. An un-migrated version 1
/// passphrase is tried last.
pub fn unlock_with_passphrase(
    info: &InfoFile,
    passphrase: &str,
    primitives: &dyn Primitives,
) -> Result<Unlocked> {
    for (index, entry) in info.passphrase_entries() {
        let KeyEntry::Passphrase {
            salt,
            confirmation_hash,
            wrapped_key,
            argon2,
        } = entry
        else {
            continue;
        };

        let (wrapping_key, candidate) =
            primitives.derive_key(passphrase.as_bytes(), salt, &(*argon2).into())?;
        if !candidate.matches(confirmation_hash) {
            continue;
        }

        let payload = primitives.unwrap(&wrapping_key, wrapped_key)?;
        let master_key = MasterKey::from_slice(&payload)?;

        tracing::debug!("unlocked with passphrase factor");
        return Ok(Unlocked {
            master_key,
            factor_id: FactorId::Passphrase(index),
        });
    }

    if let Some(master_key) = legacy_master_key(info, passphrase, primitives)? {
        tracing::debug!("unlocked with legacy passphrase");
        return Ok(Unlocked {
            master_key,
            factor_id: FactorId::Legacy,
        });
    }

    Err(RepoKeyError::InvalidCredentials {
        context: UNLOCK_CONTEXT,
    })
}

/// The version 1 master key, if `passphrase` matches the legacy hash.
///
/// In version 1 the key derived from the passphrase *is* the master key.
fn legacy_master_key(
    info: &InfoFile,
    passphrase: &str,
    primitives: &dyn Primitives,
) -> Result<Option<MasterKey>> {
    if !info.has_legacy_passphrase() {
        return Ok(None);
    }
    let (Some(salt), Some(stored)) = (&info.legacy_salt, &info.legacy_confirmation_hash) else {
        return Ok(None);
    };

    let params = info.legacy_argon2.unwrap_or_default();
    let (derived, candidate) =
        primitives.derive_key(passphrase.as_bytes(), salt, &params.into())?;
    if !candidate.matches(stored) {
        return Ok(None);
    }
    Ok(Some(MasterKey::new(*derived.as_bytes())))
}

// ---------------------------------------------------------------------------
// Remove factor
// ---------------------------------------------------------------------------

/// Remove one unlock factor and return it.
///
/// Refuses to remove the last remaining factor.
pub fn remove_factor(info: &mut InfoFile, target: &FactorId) -> Result<KeyEntry> {
    let index = match target {
        FactorId::Recipient(id) => info.keys.iter().position(|k| k.is_recipient(id)),
        FactorId::Passphrase(index) => Some(*index)
            .filter(|i| matches!(info.keys.get(*i), Some(KeyEntry::Passphrase { .. }))),
        FactorId::Legacy => None,
    };

    let Some(index) = index else {
        return Err(RepoKeyError::FactorNotFound(target.to_string()));
    };

    if info.factor_count() <= 1 {
        return Err(RepoKeyError::LastFactor);
    }

    let removed = info.keys.remove(index);
    tracing::info!(kind = removed.kind_label(), keys = info.keys.len(), "removed unlock factor");
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

/// Migrate `info` forward to `CURRENT_VERSION`, one step at a time.
///
/// - 1 → 2: the legacy passphrase (if any) is verified, the master key
///   re-wrapped under a brand-new salt as a regular passphrase entry,
///   and the legacy fields cleared.
/// - 2 → 3: version bump only.
///
/// At the current version this is a no-op. Any other version fails with
/// `UnsupportedVersion`. On every failure `info` is left untouched;
/// entries other than the legacy passphrase are never modified.
pub fn upgrade(
    info: &mut InfoFile,
    primitives: &dyn Primitives,
    source: &mut dyn PassphraseSource,
) -> Result<UpgradeReport> {
    let from_version = info.version;
    match from_version {
        CURRENT_VERSION => {
            return Ok(UpgradeReport {
                from_version,
                to_version: CURRENT_VERSION,
                rotated_passphrase: false,
            })
        }
        1 | 2 => {}
        other => return Err(RepoKeyError::UnsupportedVersion(other)),
    }

    let mut rotated_passphrase = false;

    // 1 -> 2
    if info.version < 2 {
        rotated_passphrase = upgrade_v1(info, primitives, source)?;
        info.version = 2;
    }

    // 2 -> 3: the change is in the index format, outside this crate; the
    // bump stops older readers from opening the new index.
    info.version = CURRENT_VERSION;

    tracing::info!(from_version, to_version = info.version, rotated_passphrase, "upgraded info file");
    Ok(UpgradeReport {
        from_version,
        to_version: info.version,
        rotated_passphrase,
    })
}

/// Returns whether a legacy passphrase was migrated.
fn upgrade_v1(
    info: &mut InfoFile,
    primitives: &dyn Primitives,
    source: &mut dyn PassphraseSource,
) -> Result<bool> {
    // Asymmetric entries already live in `keys`; only passphrases move.
    if !info.has_legacy_passphrase() {
        return Ok(false);
    }

    let passphrase = source.acquire_passphrase()?;

    let master_key = legacy_master_key(info, &passphrase, primitives)?.ok_or(
        RepoKeyError::InvalidCredentials {
            context: MIGRATE_CONTEXT,
        },
    )?;

    // The replacement entry is a new factor, so it takes the configured params.
    let new_salt = primitives.generate_salt()?;
    let params = primitives.argon2_params();
    let (wrapping_key, confirmation_hash) =
        primitives.derive_key(passphrase.as_bytes(), &new_salt, &params)?;
    let wrapped = primitives.wrap(&wrapping_key, master_key.as_bytes())?;

    info.add_passphrase(
        new_salt,
        confirmation_hash.as_bytes().to_vec(),
        wrapped,
        params.into(),
    )?;
    info.clear_legacy_passphrase();
    Ok(true)
}
