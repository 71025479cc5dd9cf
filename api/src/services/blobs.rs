//! Artifact I/O moved onto the blocking pool.

use std::path::PathBuf;
use util::state::AppState;
use util::storage::StorageError;

pub async fn write(app_state: &AppState, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
    let store = app_state.storage();
    let key = PathBuf::from(key);
    tokio::task::spawn_blocking(move || store.write(&key, &bytes))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
}

pub async fn read(app_state: &AppState, key: &str) -> Result<Vec<u8>, StorageError> {
    let store = app_state.storage();
    let key = PathBuf::from(key);
    tokio::task::spawn_blocking(move || store.read(&key))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
}
