//! Configuration loaded from `.repokey.toml`.

pub mod settings;

pub use settings::Settings;
