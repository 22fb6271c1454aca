//! `repokey audit`: display the audit log.
//!
//! Usage:
//!   repokey audit               # show last 50 entries
//!   repokey audit --last 20     # show last 20

use crate::cli::Cli;
use crate::errors::{RepoKeyError, Result};

/// Execute the `audit` command.
#[cfg(feature = "audit-log")]
pub fn execute(cli: &Cli, last: usize) -> Result<()> {
    use comfy_table::{ContentArrangement, Table};

    use crate::audit::AuditLog;
    use crate::cli::{output, Context};

    let ctx = Context::load(cli)?;
    if !ctx.info_path().exists() {
        return Err(RepoKeyError::RepositoryNotFound(ctx.repo_dir));
    }

    let audit = AuditLog::open(&ctx.repo_dir)
        .ok_or_else(|| RepoKeyError::AuditError("failed to open audit database".into()))?;

    let entries = audit.query(last)?;
    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Key", "Details"]);

    for entry in &entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.operation.clone(),
            entry.factor.clone().unwrap_or_else(|| "-".into()),
            entry.details.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Execute the `audit` command (audit log not compiled in).
#[cfg(not(feature = "audit-log"))]
pub fn execute(cli: &Cli, last: usize) -> Result<()> {
    let _ = (cli, last);
    Err(RepoKeyError::AuditError(
        "audit log not compiled, rebuild with `cargo build --features audit-log`".into(),
    ))
}
