//! Filesystem probes and content fingerprints.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::Fingerprint;

/// Errors that can occur when accessing the filesystem
#[derive(Debug, Error)]
pub enum FsError {
    #[error("creating directory {} failed", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resolving absolute path of {} failed", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("opening file {} failed", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading file {} failed", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[must_use]
pub fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[must_use]
pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// True if `path` exists and is not a directory.
#[must_use]
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| !m.is_dir())
}

/// Create `path` and its parents if missing, returning its absolute form.
///
/// # Errors
///
/// Returns [`FsError::CreateDir`] or [`FsError::Canonicalize`] on I/O failure.
pub fn ensure_dir(path: &Path) -> Result<PathBuf, FsError> {
    fs::create_dir_all(path).map_err(|source| FsError::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    path.canonicalize().map_err(|source| FsError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

/// SHA-256 fingerprint of the file content at `path`.
///
/// # Errors
///
/// Returns [`FsError::Open`] or [`FsError::Read`] if the file cannot be read.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, FsError> {
    let mut file = File::open(path).map_err(|source| FsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|source| FsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Fingerprint::new(hex::encode(hasher.finalize())))
}
