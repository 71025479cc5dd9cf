//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub storage_root: String,
    pub host: String,
    pub port: u16,
    /// Base URL workers use to reach this server, e.g. `http://grader.internal:3000`.
    pub public_base_url: String,
    /// Shared HMAC secret for worker requests. `None` means unconfigured.
    pub worker_shared_secret: Option<String>,
    /// File the shared secret is persisted to and reloaded from.
    pub worker_secret_path: Option<String>,
    /// When set, every worker request must carry exactly this `X-Worker-Id`.
    pub required_worker_id: Option<String>,
    pub max_clock_skew_seconds: i64,
    pub nonce_ttl_seconds: i64,
    pub max_upload_bytes: usize,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every key has a development default, so this never panics.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = parsed_or("PORT", 3000u16);

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "gradeq".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/gradeq.db".into()),
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "data/storage".into()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}")),
            host,
            port,
            worker_shared_secret: non_empty("WORKER_SHARED_SECRET"),
            worker_secret_path: non_empty("WORKER_SECRET_PATH"),
            required_worker_id: non_empty("REQUIRED_WORKER_ID"),
            max_clock_skew_seconds: parsed_or("MAX_CLOCK_SKEW_SECONDS", 60),
            nonce_ttl_seconds: parsed_or("NONCE_TTL_SECONDS", 300),
            max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_storage_root(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_root = value.into());
    }

    pub fn set_public_base_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.public_base_url = value.into());
    }

    pub fn set_worker_shared_secret(value: Option<String>) {
        AppConfig::set_field(|cfg| cfg.worker_shared_secret = value);
    }

    pub fn set_worker_secret_path(value: Option<String>) {
        AppConfig::set_field(|cfg| cfg.worker_secret_path = value);
    }

    pub fn set_required_worker_id(value: Option<String>) {
        AppConfig::set_field(|cfg| cfg.required_worker_id = value);
    }

    pub fn set_max_clock_skew_seconds(value: i64) {
        AppConfig::set_field(|cfg| cfg.max_clock_skew_seconds = value);
    }

    pub fn set_nonce_ttl_seconds(value: i64) {
        AppConfig::set_field(|cfg| cfg.nonce_ttl_seconds = value);
    }
}

// --- Free accessors ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn storage_root() -> String {
    AppConfig::global().storage_root.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn public_base_url() -> String {
    AppConfig::global().public_base_url.clone()
}

pub fn max_upload_bytes() -> usize {
    AppConfig::global().max_upload_bytes
}
