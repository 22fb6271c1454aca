use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable classification of a failure.
///
/// Callers branch on this to decide between retry and abort; the
/// transport and CLI layers map it to an exit status or wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A crypto primitive failed (generation, derivation, wrap/unwrap).
    PrimitiveFailure,
    /// Nothing the caller supplied unlocked the repository.
    InvalidCredentials,
    /// The factor being added already unlocks the repository.
    DuplicateFactor,
    /// Migration was attempted from an unhandled version.
    UnsupportedVersion,
    /// Interactive input was aborted.
    Cancelled,
    /// Bad arguments or malformed metadata.
    InvalidInput,
    /// Filesystem or serialization trouble.
    Storage,
}

impl ErrorKind {
    /// Stable snake_case name, used in host-facing error records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimitiveFailure => "primitive_failure",
            Self::InvalidCredentials => "invalid_credentials",
            Self::DuplicateFactor => "duplicate_factor",
            Self::UnsupportedVersion => "unsupported_version",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid_input",
            Self::Storage => "storage",
        }
    }
}

/// All errors that can occur in repokey.
///
/// `Display` carries diagnostic detail; `user_message()` is the short
/// line shown to people. Neither ever contains key material.
#[derive(Debug, Error)]
pub enum RepoKeyError {
    // --- Crypto errors ---
    #[error("{context}: {detail}")]
    PrimitiveFailure {
        context: &'static str,
        detail: String,
    },

    #[error("{context}: no unlock factor matched")]
    InvalidCredentials { context: &'static str },

    #[error("{0}")]
    DuplicateFactor(&'static str),

    #[error("repository version {0} cannot be upgraded")]
    UnsupportedVersion(i32),

    // --- Factor management ---
    #[error("No unlock factor matches '{0}'")]
    FactorNotFound(String),

    #[error("Refusing to remove the only unlock factor of the repository")]
    LastFactor,

    // --- Metadata errors ---
    #[error("Repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    #[error("Repository already exists at {0}")]
    RepositoryAlreadyExists(PathBuf),

    #[error("Invalid info file: {0}")]
    InvalidInfoFile(String),

    // --- Identity errors ---
    #[error("Identity error: {0}")]
    IdentityError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI / host errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    Cancelled,

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl RepoKeyError {
    /// Shorthand for a primitive failure with a fixed human context.
    pub fn primitive(context: &'static str, detail: impl Into<String>) -> Self {
        Self::PrimitiveFailure {
            context,
            detail: detail.into(),
        }
    }

    /// The machine error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PrimitiveFailure { .. } => ErrorKind::PrimitiveFailure,
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::DuplicateFactor(_) => ErrorKind::DuplicateFactor,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::FactorNotFound(_)
            | Self::LastFactor
            | Self::InvalidInfoFile(_)
            | Self::ConfigError(_)
            | Self::CommandFailed(_)
            | Self::IdentityError(_) => ErrorKind::InvalidInput,
            Self::RepositoryNotFound(_)
            | Self::RepositoryAlreadyExists(_)
            | Self::Io(_)
            | Self::SerializationError(_)
            | Self::AuditError(_) => ErrorKind::Storage,
        }
    }

    /// Short human-readable message, distinct from the diagnostic detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PrimitiveFailure { context, .. } => *context,
            Self::InvalidCredentials { context } => *context,
            Self::DuplicateFactor(_) => "Key already added",
            Self::UnsupportedVersion(_) => "Unsupported repository version",
            Self::Cancelled => "Operation cancelled",
            Self::FactorNotFound(_) => "Key not found",
            Self::LastFactor => "Cannot remove the last key",
            Self::RepositoryNotFound(_) => "Repository not found",
            Self::RepositoryAlreadyExists(_) => "Repository already exists",
            Self::InvalidInfoFile(_) => "Repository metadata is invalid",
            Self::IdentityError(_) => "Identity error",
            Self::ConfigError(_) => "Configuration error",
            Self::Io(_) => "I/O error",
            Self::SerializationError(_) => "Error serializing repository metadata",
            Self::CommandFailed(_) => "Command failed",
            Self::AuditError(_) => "Audit log error",
        }
    }
}

/// Convenience type alias for repokey results.
pub type Result<T> = std::result::Result<T, RepoKeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credentials_message_has_no_factor_detail() {
        let err = RepoKeyError::InvalidCredentials {
            context: "Cannot unlock the repository",
        };
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(err.user_message(), "Cannot unlock the repository");
        assert_eq!(
            err.to_string(),
            "Cannot unlock the repository: no unlock factor matched"
        );
    }

    #[test]
    fn primitive_user_message_hides_detail() {
        let err = RepoKeyError::primitive("Error wrapping the master key", "aead: bad length");
        assert_eq!(err.kind(), ErrorKind::PrimitiveFailure);
        assert_eq!(err.user_message(), "Error wrapping the master key");
        assert!(err.to_string().contains("aead: bad length"));
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ErrorKind::DuplicateFactor.as_str(), "duplicate_factor");
        assert_eq!(ErrorKind::Cancelled.as_str(), "cancelled");
    }
}
