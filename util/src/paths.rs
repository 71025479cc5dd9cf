use crate::config;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Create a directory (and all parents) if it doesn't exist, and return the path.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let p = path.as_ref();
    fs::create_dir_all(p)?;
    Ok(p.to_path_buf())
}

/// Ensure the parent directory of a *file path* exists (no-op if none).
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Global storage root (absolute), from `config::storage_root()`.
/// If relative in env, resolve against current_dir().
pub fn storage_root() -> PathBuf {
    let root = config::storage_root();
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

// ─── Relative keys (what the database stores) ───────────────────────

/// {test_setups}/setup_{id}
pub fn test_setup_key(test_setup_id: i64) -> PathBuf {
    PathBuf::from("test_setups").join(format!("setup_{test_setup_id}"))
}

/// test_setups/setup_{id}/bundle.zip
pub fn test_setup_bundle_key(test_setup_id: i64) -> PathBuf {
    test_setup_key(test_setup_id).join("bundle.zip")
}

/// test_setups/setup_{id}/notebook.ipynb
pub fn test_setup_notebook_key(test_setup_id: i64) -> PathBuf {
    test_setup_key(test_setup_id).join("notebook.ipynb")
}

/// submissions/setup_{test_setup_id}/{user_dir}/attempt_{n}/{stored_name}
///
/// Anonymous submissions land under `anonymous`.
pub fn submission_key(
    test_setup_id: i64,
    user_id: Option<i64>,
    attempt_number: i64,
    stored_name: &str,
) -> PathBuf {
    let user_dir = match user_id {
        Some(id) => format!("user_{id}"),
        None => "anonymous".to_string(),
    };
    PathBuf::from("submissions")
        .join(format!("setup_{test_setup_id}"))
        .join(user_dir)
        .join(format!("attempt_{attempt_number}"))
        .join(stored_name)
}
