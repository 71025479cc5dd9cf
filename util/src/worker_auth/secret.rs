use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Runtime-replaceable worker shared secret, optionally persisted to disk.
///
/// The gate reads it on every request; operators replace it through [`SharedSecret::set`].
#[derive(Debug)]
pub struct SharedSecret {
    value: RwLock<Option<String>>,
    persist_path: Option<PathBuf>,
}

impl SharedSecret {
    pub fn new(value: Option<String>, persist_path: Option<PathBuf>) -> Self {
        Self {
            value: RwLock::new(value.filter(|v| !v.is_empty())),
            persist_path,
        }
    }

    /// In-memory secret with no persistence.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::new(Some(value.into()), None)
    }

    /// No secret configured: every worker request will be refused.
    pub fn unconfigured() -> Self {
        Self::new(None, None)
    }

    /// Resolves the startup secret.
    ///
    /// An explicit value wins and is written to `persist_path`; otherwise the
    /// persisted file is read back.
    pub fn load(explicit: Option<String>, persist_path: Option<PathBuf>) -> std::io::Result<Self> {
        let secret = Self::new(None, persist_path.clone());
        match (explicit.filter(|v| !v.trim().is_empty()), persist_path) {
            (Some(value), path) => {
                secret.set(value.trim())?;
                tracing::info!(persisted_to = ?path, "Worker secret loaded from configuration");
            }
            (None, Some(path)) if path.exists() => {
                let stored = fs::read_to_string(&path)?;
                secret.set_in_memory(stored.trim());
                tracing::info!(path = %path.display(), "Worker secret loaded from disk");
            }
            _ => {}
        }
        if !secret.is_configured() {
            tracing::warn!("No worker secret configured; worker requests will be refused");
        }
        Ok(secret)
    }

    pub fn get(&self) -> Option<String> {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_some()
    }

    /// Replaces the secret and persists it when a path is configured.
    pub fn set(&self, value: &str) -> std::io::Result<()> {
        if let Some(path) = &self.persist_path {
            crate::paths::ensure_parent_dir(path)?;
            fs::write(path, value)?;
        }
        self.set_in_memory(value);
        Ok(())
    }

    fn set_in_memory(&self, value: &str) {
        let mut guard = self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
    }
}
