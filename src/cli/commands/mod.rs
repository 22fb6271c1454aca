//! Command implementations, one file per subcommand.

pub mod audit_cmd;
pub mod identity;
pub mod init;
pub mod keys;
pub mod upgrade;
