//! `repokey keys`: manage the repository's unlock keys.
//!
//! Subcommands:
//! - `repokey keys add [--recipient ID]`: add a passphrase or recipient
//! - `repokey keys rm [--recipient ID | --index N]`: remove a key
//! - `repokey keys list`: list keys
//! - `repokey keys test`: check which key unlocks
//!
//! Adding and removing keys require unlocking the repository first.

use crate::cli::output;
use crate::cli::{record, Cli, Context};
use crate::errors::Result;
use crate::keys::{self, FactorId, FactorSpec};
use crate::prompt::{PassphraseSource, TerminalPrompt};

/// Execute `repokey keys add`.
pub fn execute_add(cli: &Cli, recipient: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut info = ctx.read_info()?;
    let primitives = ctx.primitives()?;

    output::info("Unlock the repository with an existing key.");
    let unlocked = keys::unlock(&info, &primitives, &mut TerminalPrompt::new())?;

    let factor = FactorSpec::from_recipient(recipient);
    if factor == FactorSpec::Passphrase {
        output::info("Choose the passphrase to add.");
    }
    keys::add_factor(
        &mut info,
        &unlocked.master_key,
        &factor,
        &primitives,
        &mut TerminalPrompt::new_passphrase(),
    )?;

    ctx.write_info(&info)?;
    record(
        &ctx.repo_dir,
        "add-key",
        Some(&unlocked.factor_id.to_string()),
        Some(&format!("{} keys", info.keys.len())),
    );

    output::success("Key added");
    Ok(())
}

/// Execute `repokey keys rm`.
///
/// With neither flag, prompts for the passphrase to remove and removes
/// the entry it unlocks.
pub fn execute_rm(cli: &Cli, recipient: Option<&str>, index: Option<usize>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut info = ctx.read_info()?;
    let primitives = ctx.primitives()?;

    let target = match (recipient, index) {
        (Some(id), _) => {
            // Prove access before revoking someone else's key.
            output::info("Unlock the repository with an existing key.");
            keys::unlock(&info, &primitives, &mut TerminalPrompt::new())?;
            FactorId::Recipient(id.to_string())
        }
        (None, Some(i)) => {
            output::info("Unlock the repository with an existing key.");
            keys::unlock(&info, &primitives, &mut TerminalPrompt::new())?;
            FactorId::Passphrase(i)
        }
        (None, None) => {
            output::info("Enter the passphrase to remove.");
            let passphrase = TerminalPrompt::new().acquire_passphrase()?;
            keys::unlock_with_passphrase(&info, &passphrase, &primitives)?.factor_id
        }
    };

    let removed = keys::remove_factor(&mut info, &target)?;

    ctx.write_info(&info)?;
    record(
        &ctx.repo_dir,
        "rm-key",
        Some(&target.to_string()),
        Some(removed.kind_label()),
    );

    output::success(&format!("Removed {} key", removed.kind_label()));
    Ok(())
}

/// Execute `repokey keys list`.
pub fn execute_list(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let info = ctx.read_info()?;

    output::print_keys_table(&info);
    output::tip(&format!("Repository format version {}", info.version));
    Ok(())
}

/// Execute `repokey keys test`.
pub fn execute_test(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let info = ctx.read_info()?;
    let primitives = ctx.primitives()?;

    let unlocked = keys::unlock(&info, &primitives, &mut TerminalPrompt::new())?;
    let factor = unlocked.factor_id.to_string();
    record(&ctx.repo_dir, "unlock", Some(&factor), None);

    output::success(&format!("Repository unlocked with key {factor}"));
    Ok(())
}
