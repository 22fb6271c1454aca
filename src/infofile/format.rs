//! JSON codec for the info file.
//!
//! The info file lives at `<repo>/_info.json`:
//!
//! ```text
//! {
//!   "app": "repokey",
//!   "version": 3,
//!   "keys": [
//!     {"type": "passphrase", "salt": "…", "confirmation_hash": "…", "wrapped_key": "…"},
//!     {"type": "asymmetric", "recipient_id": "…", "wrapped_key": "…"}
//!   ]
//! }
//! ```
//!
//! Byte fields are base64. Version 1 files may also carry top-level
//! `salt` and `confirmation_hash`. Entry order is preserved exactly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::model::{InfoFile, APP_NAME};
use crate::errors::{RepoKeyError, Result};

/// File name of the info file inside a repository directory.
pub const INFO_FILE_NAME: &str = "_info.json";

/// Path of the info file for a repository directory.
pub fn info_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(INFO_FILE_NAME)
}

/// Serialize an info file to JSON bytes.
pub fn encode(info: &InfoFile) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(info)
        .map_err(|e| RepoKeyError::SerializationError(format!("info file: {e}")))
}

/// Parse JSON bytes into an info file.
///
/// Checks the app marker; the version is left for migration to judge.
pub fn decode(data: &[u8]) -> Result<InfoFile> {
    let info: InfoFile = serde_json::from_slice(data)
        .map_err(|e| RepoKeyError::InvalidInfoFile(format!("JSON: {e}")))?;

    if info.app != APP_NAME {
        return Err(RepoKeyError::InvalidInfoFile(format!(
            "unexpected app marker '{}'",
            info.app
        )));
    }

    Ok(info)
}

/// Write an info file to disk **atomically**.
///
/// Writes to a temp file in the same directory, then renames it over
/// the target so readers never see a half-written file.
pub fn write_info_file(path: &Path, info: &InfoFile) -> Result<()> {
    let buf = encode(info)?;

    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, &buf)?;
    fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), version = info.version, keys = info.keys.len(), "wrote info file");
    Ok(())
}

/// Read an info file from disk.
pub fn read_info_file(path: &Path) -> Result<InfoFile> {
    if !path.exists() {
        return Err(RepoKeyError::RepositoryNotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    decode(&data)
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded byte fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

pub(crate) fn base64_encode_opt<S>(
    data: &Option<Vec<u8>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match data {
        Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn base64_decode_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.is_empty() => BASE64
            .decode(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn decode_rejects_foreign_app_marker() {
        let err = decode(br#"{"app":"other","version":3,"keys":[]}"#).unwrap_err();
        assert!(err.to_string().contains("app marker"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"{not json").is_err());
    }

    #[test]
    fn decode_accepts_version_one_layout() {
        let json = br#"{"app":"repokey","version":1,"salt":"AQID","confirmation_hash":"BAUG"}"#;
        let info = decode(json).unwrap();
        assert_eq!(info.version, 1);
        assert!(info.keys.is_empty());
        assert_eq!(info.legacy_salt.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(info.legacy_confirmation_hash.as_deref(), Some(&[4u8, 5, 6][..]));
    }

    #[test]
    fn legacy_fields_are_omitted_once_cleared() {
        let info = InfoFile::new();
        let text = String::from_utf8(encode(&info).unwrap()).unwrap();
        assert!(!text.contains("\"salt\""));
        assert!(!text.contains("confirmation_hash"));
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = info_path(dir.path());
        write_info_file(&path, &InfoFile::new()).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("._info.json.tmp").exists());
    }

    #[test]
    fn read_missing_file_reports_repository_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_info_file(&info_path(dir.path())).unwrap_err();
        assert!(matches!(err, RepoKeyError::RepositoryNotFound(_)));
    }
}
