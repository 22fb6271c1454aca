//! Info file module: the repository's key metadata.
//!
//! This module provides:
//! - `InfoFile` and `KeyEntry` types (`model`)
//! - The JSON codec and atomic file I/O (`format`)

pub mod format;
pub mod model;

// Re-export the most commonly used items.
pub use format::{info_path, read_info_file, write_info_file, INFO_FILE_NAME};
pub use model::{InfoFile, KeyEntry, StoredArgon2Params, APP_NAME, CURRENT_VERSION};
