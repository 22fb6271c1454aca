use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{RepoKeyError, Result};

/// Project-level configuration, loaded from `.repokey.toml`.
///
/// Every field has a sensible default so repokey works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the repository.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: String,

    /// Directory holding local identities; `None` means the default
    /// under the home directory.
    #[serde(default)]
    pub identities_dir: Option<String>,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_repo_dir() -> String {
    "repo".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            identities_dir: None,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".repokey.toml";

    /// Load settings from `<project_dir>/.repokey.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            RepoKeyError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Full path of the repository directory.
    pub fn repo_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.repo_dir)
    }

    /// Full path of the identities directory.
    ///
    /// Relative config values resolve against `project_dir`; the default
    /// is `$HOME/.repokey/identities`, or `<project_dir>/.repokey/identities`
    /// when `HOME` is unset.
    pub fn identities_path(&self, project_dir: &Path) -> PathBuf {
        match &self.identities_dir {
            Some(dir) => project_dir.join(dir),
            None => std::env::var_os("HOME")
                .map_or_else(|| project_dir.to_path_buf(), PathBuf::from)
                .join(".repokey")
                .join("identities"),
        }
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> crate::crypto::kdf::Argon2Params {
        crate::crypto::kdf::Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
