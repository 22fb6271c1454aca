#[cfg(feature = "audit-log")]
pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod infofile;
pub mod keys;
pub mod prompt;
pub mod sandbox;
pub mod server;
