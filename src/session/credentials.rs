//! Credential Store
//!
//! Pass-through between a `CredentialBundle` and a file on disk. The file
//! holds the CBOR encoding of exactly what the transport produced.
//!
//! Writes go to a sibling temporary file that is renamed over the target,
//! so readers only ever see a complete bundle.

use super::traits::CredentialBundle;
use crate::serialization::{from_cbor, to_cbor};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Credential file errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("session file not found: {0}")]
    NotFound(PathBuf),

    #[error("session file is corrupt: {0}")]
    CorruptData(String),

    #[error("failed to encode session: {0}")]
    Encode(String),

    #[error("session file I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Load a bundle from `path`.
pub fn load(path: &Path) -> Result<CredentialBundle, CredentialError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CredentialError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    from_cbor(&bytes).map_err(|e| CredentialError::CorruptData(e.to_string()))
}

/// Persist `bundle` to `path`, replacing any previous file.
pub fn save(path: &Path, bundle: &CredentialBundle) -> Result<(), CredentialError> {
    let bytes = encode(bundle)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    if let Err(e) = fs::write(&staging, &bytes).and_then(|_| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }

    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CredentialError> {
    to_cbor(value).map_err(|e| CredentialError::Encode(e.to_string()))
}

/// Existence check. I/O errors count as "does not exist".
pub fn exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Delete the credential file. A file that is already gone is not an error.
pub fn remove(path: &Path) -> Result<(), CredentialError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
