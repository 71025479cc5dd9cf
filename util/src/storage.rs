//! Artifact blob store.
//!
//! Submissions and test-setup bundles are stored as opaque bytes under a root
//! directory, addressed by the relative key that the database row records.

use crate::paths;
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write/read access to stored artifacts by relative key.
pub trait BlobStore: Send + Sync {
    fn write(&self, key: &Path, bytes: &[u8]) -> Result<(), StorageError>;
    fn read(&self, key: &Path) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem-backed blob store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured `STORAGE_ROOT`.
    pub fn from_config() -> Self {
        Self::new(paths::storage_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to an absolute path, refusing anything that could escape the root.
    fn resolve(&self, key: &Path) -> Result<PathBuf, StorageError> {
        let display = key.to_string_lossy().to_string();
        if key.as_os_str().is_empty() {
            return Err(StorageError::InvalidKey(display));
        }
        for component in key.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::InvalidKey(display)),
            }
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, key: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(key)?;
        paths::ensure_parent_dir(&full)?;
        fs::write(&full, bytes)?;
        Ok(())
    }

    fn read(&self, key: &Path) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(key)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string_lossy().to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
