//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::Settings;
use crate::crypto::DefaultPrimitives;
use crate::errors::Result;
use crate::infofile::{self, InfoFile};

/// repokey CLI: manage the keys protecting an encrypted repository.
#[derive(Parser)]
#[command(
    name = "repokey",
    about = "Manage the unlock keys of an encrypted repository",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository directory (default: `repo_dir` from .repokey.toml, else ./repo)
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Directory holding local identities for public-key unlock
    #[arg(long, global = true)]
    pub identities: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create key material for a new repository
    Init {
        /// Protect the master key with this recipient instead of a passphrase
        #[arg(long)]
        recipient: Option<String>,
    },

    /// Manage unlock keys (add, rm, list, test)
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Upgrade the repository's key format to the latest version
    Upgrade,

    /// Manage local identities for public-key unlock
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// View the audit log of key operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
    },
}

/// Key management subcommands.
#[derive(clap::Subcommand)]
pub enum KeysAction {
    /// Add a passphrase or a recipient as a new unlock key
    Add {
        /// Recipient id (hex public key); omit to add a passphrase
        #[arg(long)]
        recipient: Option<String>,
    },

    /// Remove an unlock key
    Rm {
        /// Recipient id to remove
        #[arg(long, conflicts_with = "index")]
        recipient: Option<String>,

        /// Position of the passphrase key to remove (see `keys list`);
        /// omit both flags to remove the key matching a prompted passphrase
        #[arg(long)]
        index: Option<usize>,
    },

    /// List the repository's unlock keys
    List,

    /// Check which key unlocks the repository
    Test,
}

/// Identity subcommands.
#[derive(clap::Subcommand)]
pub enum IdentityAction {
    /// Generate a new identity and print its recipient id
    New,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved paths and settings for one command run.
pub struct Context {
    pub settings: Settings,
    pub repo_dir: PathBuf,
    pub identities_dir: PathBuf,
}

impl Context {
    /// Load `.repokey.toml` from the working directory and apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let settings = Settings::load(&cwd)?;

        let repo_dir = match &cli.repo {
            Some(dir) => cwd.join(dir),
            None => settings.repo_path(&cwd),
        };
        let identities_dir = match &cli.identities {
            Some(dir) => cwd.join(dir),
            None => settings.identities_path(&cwd),
        };

        Ok(Self {
            settings,
            repo_dir,
            identities_dir,
        })
    }

    /// Path of the repository's info file.
    pub fn info_path(&self) -> PathBuf {
        infofile::info_path(&self.repo_dir)
    }

    /// Read the current info file.
    pub fn read_info(&self) -> Result<InfoFile> {
        infofile::read_info_file(&self.info_path())
    }

    /// Persist an info file.
    pub fn write_info(&self, info: &InfoFile) -> Result<()> {
        infofile::write_info_file(&self.info_path(), info)
    }

    /// Primitives configured from settings, with local identities loaded.
    pub fn primitives(&self) -> Result<DefaultPrimitives> {
        DefaultPrimitives::load(self.settings.argon2_params(), &self.identities_dir)
    }
}

/// Record an operation in the repository's audit log, if compiled in.
pub fn record(repo_dir: &Path, op: &str, factor: Option<&str>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    crate::audit::log_audit(repo_dir, op, factor, details);

    #[cfg(not(feature = "audit-log"))]
    let _ = (repo_dir, op, factor, details);
}
