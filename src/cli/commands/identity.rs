//! `repokey identity new`: generate a key pair for public-key unlock.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::crypto::envelope::{save_identity, Identity};
use crate::errors::Result;

/// Execute `repokey identity new`.
pub fn execute_new(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let identity = Identity::generate();
    let path = save_identity(&ctx.identities_dir, &identity)?;

    output::success(&format!("Identity saved to {}", path.display()));
    println!("{}", identity.recipient_id());
    output::warning("Keep the identity file secret! Anyone with it can unlock repositories sealed to it.");
    output::tip("Run `repokey keys add --recipient <ID>` to let this identity unlock a repository.");
    Ok(())
}
