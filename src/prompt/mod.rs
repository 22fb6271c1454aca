//! Where passphrases come from.
//!
//! The orchestrator asks a `PassphraseSource` for a passphrase at most
//! once per operation and drops it as soon as the operation is done.
//! Two sources ship with the crate:
//!
//! - `TerminalPrompt`: an env var, else a masked prompt. Existing
//!   passphrases come from `REPOKEY_PASSPHRASE`; a passphrase being added
//!   comes from `REPOKEY_NEW_PASSPHRASE`, so one invocation can unlock
//!   with one and add the other.
//! - `StoredPassphrase`: a value already held in memory by the caller
//!   (an unlock request body, or a host-side store in the sandbox)

use std::io;

use zeroize::Zeroizing;

use crate::errors::{RepoKeyError, Result};

/// Environment variable read before prompting (CI/CD friendly).
pub const PASSPHRASE_ENV: &str = "REPOKEY_PASSPHRASE";

/// Environment variable read before prompting for a passphrase to add.
pub const NEW_PASSPHRASE_ENV: &str = "REPOKEY_NEW_PASSPHRASE";

/// Capability that produces a passphrase on demand.
///
/// Implementations never return an empty passphrase; an aborted
/// acquisition is `RepoKeyError::Cancelled`.
pub trait PassphraseSource {
    fn acquire_passphrase(&mut self) -> Result<Zeroizing<String>>;
}

/// Interactive terminal source.
pub struct TerminalPrompt {
    label: String,
    confirm: bool,
    env_vars: &'static [&'static str],
}

impl TerminalPrompt {
    /// Prompt once for an existing passphrase.
    pub fn new() -> Self {
        Self {
            label: "Passphrase".to_string(),
            confirm: false,
            env_vars: &[PASSPHRASE_ENV],
        }
    }

    /// Prompt for a passphrase to add next to existing keys, asking twice.
    ///
    /// Only `REPOKEY_NEW_PASSPHRASE` is consulted; the unlock passphrase
    /// is never offered as the new one.
    pub fn new_passphrase() -> Self {
        Self {
            label: "New passphrase".to_string(),
            confirm: true,
            env_vars: &[NEW_PASSPHRASE_ENV],
        }
    }

    /// Prompt for the first passphrase of a new repository.
    ///
    /// Nothing is unlocked beforehand, so `REPOKEY_PASSPHRASE` is accepted
    /// when `REPOKEY_NEW_PASSPHRASE` is unset.
    pub fn first_passphrase() -> Self {
        Self {
            label: "New passphrase".to_string(),
            confirm: true,
            env_vars: &[NEW_PASSPHRASE_ENV, PASSPHRASE_ENV],
        }
    }
}

/// First non-empty value among `names`.
fn passphrase_from_env(names: &[&str]) -> Option<Zeroizing<String>> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseSource for TerminalPrompt {
    fn acquire_passphrase(&mut self) -> Result<Zeroizing<String>> {
        if let Some(pw) = passphrase_from_env(self.env_vars) {
            return Ok(pw);
        }

        loop {
            let mut prompt = dialoguer::Password::new().with_prompt(&self.label);
            if self.confirm {
                prompt = prompt.with_confirmation(
                    "Confirm passphrase",
                    "Passphrases do not match, try again",
                );
            }

            let pw = prompt
                .allow_empty_password(true)
                .interact()
                .map_err(|e| match e {
                    dialoguer::Error::IO(ref io_err)
                        if io_err.kind() == io::ErrorKind::Interrupted =>
                    {
                        RepoKeyError::Cancelled
                    }
                    other => RepoKeyError::CommandFailed(format!("passphrase prompt: {other}")),
                })?;

            if pw.is_empty() {
                eprintln!(
                    "{} Passphrase must not be empty",
                    console::style("\u{26a0}").yellow().bold()
                );
                continue;
            }

            return Ok(Zeroizing::new(pw));
        }
    }
}

/// A passphrase the caller already holds.
///
/// Can be acquired any number of times; a missing or empty value is
/// reported as `Cancelled`, mirroring a dismissed prompt.
pub struct StoredPassphrase {
    value: Option<Zeroizing<String>>,
}

impl StoredPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            value: Some(Zeroizing::new(passphrase.into())),
        }
    }

    /// A store with nothing in it.
    pub fn empty() -> Self {
        Self { value: None }
    }
}

impl PassphraseSource for StoredPassphrase {
    fn acquire_passphrase(&mut self) -> Result<Zeroizing<String>> {
        match &self.value {
            Some(pw) if !pw.is_empty() => Ok(pw.clone()),
            _ => Err(RepoKeyError::Cancelled),
        }
    }
}
