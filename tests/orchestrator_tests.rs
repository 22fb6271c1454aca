//! Integration tests for master key orchestration.
//!
//! All tests use weak Argon2 parameters so the suite stays fast.

use repokey::crypto::{Argon2Params, DefaultPrimitives, Identity, MasterKey, Primitives};
use repokey::errors::{ErrorKind, RepoKeyError, Result};
use repokey::infofile::{InfoFile, KeyEntry, StoredArgon2Params, CURRENT_VERSION};
use repokey::keys::{
    add_factor, create_repository, remove_factor, unlock, unlock_with_passphrase, upgrade,
    FactorId, FactorSpec,
};
use repokey::prompt::{PassphraseSource, StoredPassphrase};
use zeroize::Zeroizing;

fn weak_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

fn primitives() -> DefaultPrimitives {
    DefaultPrimitives::new(weak_params())
}

/// Hands out a fixed passphrase and counts how often it was asked.
struct CountingSource {
    passphrase: String,
    calls: usize,
}

impl CountingSource {
    fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            calls: 0,
        }
    }
}

impl PassphraseSource for CountingSource {
    fn acquire_passphrase(&mut self) -> Result<Zeroizing<String>> {
        self.calls += 1;
        Ok(Zeroizing::new(self.passphrase.clone()))
    }
}

/// A version 1 info file whose master key is derived from `passphrase`.
fn legacy_info(p: &DefaultPrimitives, passphrase: &str) -> (InfoFile, MasterKey) {
    let salt = p.generate_salt().unwrap();
    let params = p.argon2_params();
    let (derived, hash) = p.derive_key(passphrase.as_bytes(), &salt, &params).unwrap();

    let mut info = InfoFile::new();
    info.version = 1;
    info.legacy_salt = Some(salt);
    info.legacy_confirmation_hash = Some(hash.as_bytes().to_vec());
    info.legacy_argon2 = Some(params.into());
    (info, MasterKey::new(*derived.as_bytes()))
}

#[test]
fn wrap_roundtrip_through_derived_key() {
    let p = primitives();
    let master_key = p.generate_master_key().unwrap();
    let salt = p.generate_salt().unwrap();

    let (wrapping_key, _) = p.derive_key(b"round trip", &salt, &weak_params()).unwrap();
    let wrapped = p.wrap(&wrapping_key, master_key.as_bytes()).unwrap();

    let (again, _) = p.derive_key(b"round trip", &salt, &weak_params()).unwrap();
    let unwrapped = p.unwrap(&again, &wrapped).unwrap();
    assert_eq!(unwrapped.as_slice(), master_key.as_bytes());
}

// ---------------------------------------------------------------------------
// Create / unlock
// ---------------------------------------------------------------------------

#[test]
fn create_then_unlock_returns_same_master_key() {
    let p = primitives();
    let (info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("pw-one"))
            .expect("create");

    assert_eq!(info.version, CURRENT_VERSION);
    assert_eq!(info.keys.len(), 1);

    let unlocked = unlock(&info, &p, &mut StoredPassphrase::new("pw-one")).expect("unlock");
    assert_eq!(unlocked.master_key, master_key);
    assert_eq!(unlocked.factor_id, FactorId::Passphrase(0));
}

#[test]
fn every_added_passphrase_unlocks_the_same_key() {
    let p = primitives();
    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("first"))
            .unwrap();

    for pw in ["second", "third"] {
        add_factor(
            &mut info,
            &master_key,
            &FactorSpec::Passphrase,
            &p,
            &mut StoredPassphrase::new(pw),
        )
        .unwrap();
    }
    assert_eq!(info.keys.len(), 3);

    for (index, pw) in ["first", "second", "third"].iter().enumerate() {
        let unlocked = unlock_with_passphrase(&info, pw, &p).unwrap();
        assert_eq!(unlocked.master_key, master_key);
        assert_eq!(unlocked.factor_id, FactorId::Passphrase(index));
    }
}

#[test]
fn wrong_passphrase_is_invalid_credentials() {
    let p = primitives();
    let (info, _) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("right"))
            .unwrap();

    let err = unlock(&info, &p, &mut StoredPassphrase::new("wrong")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(err.user_message(), "Cannot unlock the repository");
}

#[test]
fn unlock_with_no_factors_fails() {
    let p = primitives();
    let info = InfoFile::new();
    let err = unlock(&info, &p, &mut StoredPassphrase::new("anything")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
}

#[test]
fn failed_unlock_looks_the_same_however_many_factors_exist() {
    let p = primitives();
    let empty = InfoFile::new();

    let (mut crowded, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("one"))
            .unwrap();
    add_factor(
        &mut crowded,
        &master_key,
        &FactorSpec::Passphrase,
        &p,
        &mut StoredPassphrase::new("two"),
    )
    .unwrap();
    for _ in 0..2 {
        add_factor(
            &mut crowded,
            &master_key,
            &FactorSpec::Recipient(Identity::generate().recipient_id()),
            &p,
            &mut StoredPassphrase::empty(),
        )
        .unwrap();
    }
    assert_eq!(crowded.keys.len(), 4);

    let none = unlock(&empty, &p, &mut StoredPassphrase::new("wrong")).unwrap_err();
    let many = unlock(&crowded, &p, &mut StoredPassphrase::new("wrong")).unwrap_err();

    assert_eq!(none.kind(), many.kind());
    assert_eq!(none.to_string(), many.to_string());
    assert_eq!(none.user_message(), many.user_message());
}

#[test]
fn unlock_uses_params_recorded_with_the_factor() {
    let (info, master_key) = create_repository(
        &FactorSpec::Passphrase,
        &primitives(),
        &mut StoredPassphrase::new("pw"),
    )
    .unwrap();

    // The configured cost changed after the repository was created.
    let reconfigured = DefaultPrimitives::new(Argon2Params {
        iterations: 2,
        ..weak_params()
    });

    let unlocked = unlock(&info, &reconfigured, &mut StoredPassphrase::new("pw")).unwrap();
    assert_eq!(unlocked.master_key, master_key);
}

#[test]
fn new_factors_record_the_configured_params() {
    let (mut info, master_key) = create_repository(
        &FactorSpec::Passphrase,
        &primitives(),
        &mut StoredPassphrase::new("old cost"),
    )
    .unwrap();

    let slower = Argon2Params {
        iterations: 2,
        ..weak_params()
    };
    let reconfigured = DefaultPrimitives::new(slower);
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Passphrase,
        &reconfigured,
        &mut StoredPassphrase::new("new cost"),
    )
    .unwrap();

    let stored: Vec<StoredArgon2Params> = info
        .keys
        .iter()
        .filter_map(|k| match k {
            KeyEntry::Passphrase { argon2, .. } => Some(*argon2),
            KeyEntry::Asymmetric { .. } => None,
        })
        .collect();
    assert_eq!(
        stored,
        vec![
            StoredArgon2Params::from(weak_params()),
            StoredArgon2Params::from(slower)
        ]
    );

    // Both unlock regardless of which params are configured now.
    for pw in ["old cost", "new cost"] {
        let unlocked = unlock_with_passphrase(&info, pw, &primitives()).unwrap();
        assert_eq!(unlocked.master_key, master_key);
    }
}

#[test]
fn damaged_wrapped_key_is_a_primitive_failure() {
    let p = primitives();
    let (mut info, _) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("pw"))
            .unwrap();
    if let KeyEntry::Passphrase { wrapped_key, .. } = &mut info.keys[0] {
        wrapped_key[20] ^= 0xFF;
    }

    let err = unlock(&info, &p, &mut StoredPassphrase::new("pw")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrimitiveFailure);

    // A wrong passphrase never gets as far as the damaged blob.
    let err = unlock(&info, &p, &mut StoredPassphrase::new("other")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
}

#[test]
fn passphrase_is_acquired_once_per_unlock() {
    let p = primitives();
    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("one"))
            .unwrap();
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Passphrase,
        &p,
        &mut StoredPassphrase::new("two"),
    )
    .unwrap();

    let mut source = CountingSource::new("nope");
    assert!(unlock(&info, &p, &mut source).is_err());
    assert_eq!(source.calls, 1);
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

#[test]
fn duplicate_passphrase_is_rejected_without_change() {
    let p = primitives();
    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("same"))
            .unwrap();
    let before = info.clone();

    let err = add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Passphrase,
        &p,
        &mut StoredPassphrase::new("same"),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateFactor);
    assert_eq!(info, before);
}

#[test]
fn recipient_ids_are_unique_ignoring_case() {
    let p = primitives();
    let identity = Identity::generate();
    let lower = identity.recipient_id();
    let upper = lower.to_uppercase();

    let (mut info, master_key) = create_repository(
        &FactorSpec::Recipient(upper),
        &p,
        &mut StoredPassphrase::empty(),
    )
    .unwrap();
    assert_eq!(info.keys.len(), 1);

    let err = add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Recipient(lower),
        &p,
        &mut StoredPassphrase::empty(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateFactor);
    assert_eq!(info.keys.len(), 1);
}

// ---------------------------------------------------------------------------
// Asymmetric
// ---------------------------------------------------------------------------

#[test]
fn asymmetric_factor_unlocks_without_prompting() {
    let identity = Identity::generate();
    let recipient = identity.recipient_id();
    let p = DefaultPrimitives::with_identities(weak_params(), vec![identity]);

    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("pw"))
            .unwrap();
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Recipient(recipient.clone()),
        &p,
        &mut StoredPassphrase::empty(),
    )
    .unwrap();

    let mut source = CountingSource::new("pw");
    let unlocked = unlock(&info, &p, &mut source).unwrap();
    assert_eq!(unlocked.master_key, master_key);
    assert_eq!(unlocked.factor_id, FactorId::Recipient(recipient));
    assert_eq!(source.calls, 0);
}

#[test]
fn foreign_recipient_falls_back_to_passphrase() {
    let stranger = Identity::generate();
    let p = primitives();

    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("pw"))
            .unwrap();
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Recipient(stranger.recipient_id()),
        &p,
        &mut StoredPassphrase::empty(),
    )
    .unwrap();

    let mut source = CountingSource::new("pw");
    let unlocked = unlock(&info, &p, &mut source).unwrap();
    assert_eq!(unlocked.factor_id, FactorId::Passphrase(0));
    assert_eq!(source.calls, 1);
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

#[test]
fn removed_passphrase_no_longer_unlocks() {
    let p = primitives();
    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("keep"))
            .unwrap();
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Passphrase,
        &p,
        &mut StoredPassphrase::new("drop"),
    )
    .unwrap();

    let target = unlock_with_passphrase(&info, "drop", &p).unwrap().factor_id;
    let removed = remove_factor(&mut info, &target).unwrap();
    assert!(matches!(removed, KeyEntry::Passphrase { .. }));

    let err = unlock_with_passphrase(&info, "drop", &p).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert!(unlock_with_passphrase(&info, "keep", &p).is_ok());
}

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

#[test]
fn legacy_passphrase_unlocks_before_upgrade() {
    let p = primitives();
    let (info, master_key) = legacy_info(&p, "old-pw");

    let unlocked = unlock_with_passphrase(&info, "old-pw", &p).unwrap();
    assert_eq!(unlocked.master_key, master_key);
    assert_eq!(unlocked.factor_id, FactorId::Legacy);
}

#[test]
fn upgrade_rotates_legacy_passphrase() {
    let p = primitives();
    let (mut info, master_key) = legacy_info(&p, "old-pw");
    let old_salt = info.legacy_salt.clone().unwrap();

    let report = upgrade(&mut info, &p, &mut StoredPassphrase::new("old-pw")).unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, CURRENT_VERSION);
    assert!(report.rotated_passphrase);

    assert_eq!(info.version, CURRENT_VERSION);
    assert!(!info.has_legacy_passphrase());
    assert_eq!(info.keys.len(), 1);
    match &info.keys[0] {
        KeyEntry::Passphrase { salt, .. } => assert_ne!(salt, &old_salt),
        other => panic!("expected passphrase entry, got {other:?}"),
    }

    let unlocked = unlock_with_passphrase(&info, "old-pw", &p).unwrap();
    assert_eq!(unlocked.master_key, master_key);
    assert_eq!(unlocked.factor_id, FactorId::Passphrase(0));
}

#[test]
fn upgrade_is_idempotent() {
    let p = primitives();
    let (mut info, _) = legacy_info(&p, "old-pw");

    upgrade(&mut info, &p, &mut StoredPassphrase::new("old-pw")).unwrap();
    let once = info.clone();

    let report = upgrade(&mut info, &p, &mut StoredPassphrase::empty()).unwrap();
    assert_eq!(report.from_version, report.to_version);
    assert!(!report.rotated_passphrase);
    assert_eq!(info, once);
}

#[test]
fn upgrade_with_wrong_passphrase_leaves_info_untouched() {
    let p = primitives();
    let (mut info, _) = legacy_info(&p, "old-pw");
    let before = info.clone();

    let err = upgrade(&mut info, &p, &mut StoredPassphrase::new("guess")).unwrap_err();
    assert!(matches!(
        err,
        RepoKeyError::InvalidCredentials {
            context: "Cannot unlock the repository to migrate it"
        }
    ));
    assert_eq!(info, before);
}

#[test]
fn upgrade_verifies_legacy_passphrase_with_its_own_params() {
    let (mut info, master_key) = legacy_info(&primitives(), "old-pw");

    let slower = Argon2Params {
        iterations: 2,
        ..weak_params()
    };
    let reconfigured = DefaultPrimitives::new(slower);

    upgrade(&mut info, &reconfigured, &mut StoredPassphrase::new("old-pw")).unwrap();
    assert!(info.legacy_argon2.is_none());
    match &info.keys[0] {
        KeyEntry::Passphrase { argon2, .. } => assert_eq!(*argon2, StoredArgon2Params::from(slower)),
        other => panic!("expected passphrase entry, got {other:?}"),
    }

    let unlocked = unlock_with_passphrase(&info, "old-pw", &primitives()).unwrap();
    assert_eq!(unlocked.master_key, master_key);
}

#[test]
fn upgrade_keeps_existing_asymmetric_entries() {
    let p = primitives();
    let identity = Identity::generate();
    let (mut info, master_key) = legacy_info(&p, "old-pw");
    add_factor(
        &mut info,
        &master_key,
        &FactorSpec::Recipient(identity.recipient_id()),
        &p,
        &mut StoredPassphrase::empty(),
    )
    .unwrap();
    let asymmetric_before = info.keys[0].clone();

    upgrade(&mut info, &p, &mut StoredPassphrase::new("old-pw")).unwrap();
    assert_eq!(info.keys.len(), 2);
    assert_eq!(info.keys[0], asymmetric_before);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn backup_passphrase_recovers_after_primary_is_removed() {
    let p = primitives();

    // Create with a primary passphrase, then add a backup phrase.
    let (mut info, master_key) =
        create_repository(&FactorSpec::Passphrase, &p, &mut StoredPassphrase::new("primary"))
            .unwrap();
    let unlocked = unlock(&info, &p, &mut StoredPassphrase::new("primary")).unwrap();
    add_factor(
        &mut info,
        &unlocked.master_key,
        &FactorSpec::Passphrase,
        &p,
        &mut StoredPassphrase::new("backup phrase"),
    )
    .unwrap();

    for pw in ["primary", "backup phrase"] {
        let unlocked = unlock(&info, &p, &mut StoredPassphrase::new(pw)).unwrap();
        assert_eq!(unlocked.master_key, master_key);
    }
    let err = unlock(&info, &p, &mut StoredPassphrase::new("wrong")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

    // Forget the primary.
    let target = unlock_with_passphrase(&info, "primary", &p).unwrap().factor_id;
    remove_factor(&mut info, &target).unwrap();

    let recovered = unlock(&info, &p, &mut StoredPassphrase::new("backup phrase")).unwrap();
    assert_eq!(recovered.master_key, master_key);
    assert_eq!(recovered.factor_id, FactorId::Passphrase(0));
}
