//! `repokey upgrade`: migrate the info file to the latest format.
//!
//! Repositories created by version 1 store their passphrase outside the
//! key list; upgrading asks for that passphrase once and re-wraps the
//! master key under a new salt.

use crate::cli::output;
use crate::cli::{record, Cli, Context};
use crate::errors::Result;
use crate::keys;
use crate::prompt::TerminalPrompt;

/// Execute the `upgrade` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut info = ctx.read_info()?;
    let primitives = ctx.primitives()?;

    if info.has_legacy_passphrase() {
        output::info("Enter the repository passphrase to migrate it.");
    }

    let report = keys::upgrade(&mut info, &primitives, &mut TerminalPrompt::new())?;

    if report.from_version == report.to_version {
        output::info(&format!(
            "Repository is already at version {}",
            report.to_version
        ));
        return Ok(());
    }

    ctx.write_info(&info)?;
    record(
        &ctx.repo_dir,
        "upgrade",
        None,
        Some(&format!("{} -> {}", report.from_version, report.to_version)),
    );

    output::success(&format!(
        "Repository upgraded from version {} to {}",
        report.from_version, report.to_version
    ));
    if report.rotated_passphrase {
        output::info("Your passphrase was re-wrapped with a new salt.");
    }
    Ok(())
}
