//! `repokey init`: create key material for a new repository.

use std::fs;

use crate::cli::output;
use crate::cli::{record, Cli, Context};
use crate::errors::{RepoKeyError, Result};
use crate::keys::{self, FactorSpec};
use crate::prompt::TerminalPrompt;

/// Execute the `init` command.
pub fn execute(cli: &Cli, recipient: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let info_path = ctx.info_path();

    // 1. Refuse to clobber an existing repository.
    if info_path.exists() {
        output::tip("Use `repokey keys add` to add another key to the existing repository.");
        return Err(RepoKeyError::RepositoryAlreadyExists(ctx.repo_dir));
    }

    // 2. Create the repository directory if it doesn't exist.
    if !ctx.repo_dir.exists() {
        fs::create_dir_all(&ctx.repo_dir)?;
        output::info(&format!(
            "Created repository directory: {}",
            ctx.repo_dir.display()
        ));
    }

    // 3. Generate the master key and wrap it with the first factor.
    let factor = FactorSpec::from_recipient(recipient);
    let primitives = ctx.primitives()?;
    let mut source = TerminalPrompt::first_passphrase();
    let (info, _master_key) = keys::create_repository(&factor, &primitives, &mut source)?;

    // 4. Persist.
    ctx.write_info(&info)?;

    let factor_label = match &factor {
        FactorSpec::Passphrase => "passphrase",
        FactorSpec::Recipient(_) => "recipient",
    };
    record(
        &ctx.repo_dir,
        "init",
        Some(factor_label),
        Some("repository created"),
    );

    output::success(&format!(
        "Repository initialized at {}",
        ctx.repo_dir.display()
    ));
    output::tip("Run `repokey keys add` to add a backup key.");

    Ok(())
}
