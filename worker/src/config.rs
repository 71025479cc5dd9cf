//! Worker configuration, read once at startup from `.env` and the environment.

use crate::error::WorkerError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the dispatch server, e.g. `http://grader.internal:3000`.
    pub server_url: String,
    pub worker_id: String,
    pub shared_secret: String,
    pub hostname: Option<String>,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Parent directory for per-job scratch directories.
    pub work_dir: PathBuf,
    pub python: String,
    pub shell: String,
    pub http_timeout: Duration,
    pub max_archive_bytes: u64,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Loads the configuration. Only `WORKER_SHARED_SECRET` is mandatory.
    pub fn from_env() -> Result<Self, WorkerError> {
        dotenvy::dotenv().ok();

        let shared_secret = non_empty("WORKER_SHARED_SECRET")
            .ok_or_else(|| WorkerError::Config("WORKER_SHARED_SECRET is not set".into()))?;

        Ok(Self {
            server_url: env::var("WORKER_SERVER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".into()),
            worker_id: env::var("WORKER_ID").unwrap_or_else(|_| "worker-1".into()),
            shared_secret,
            hostname: non_empty("WORKER_HOSTNAME").or_else(|| non_empty("HOSTNAME")),
            backoff_initial: Duration::from_millis(parsed_or("WORKER_BACKOFF_INITIAL_MS", 500)),
            backoff_max: Duration::from_millis(parsed_or("WORKER_BACKOFF_MAX_MS", 30_000)),
            work_dir: non_empty("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            python: env::var("WORKER_PYTHON").unwrap_or_else(|_| "python3".into()),
            shell: env::var("WORKER_SHELL").unwrap_or_else(|_| "sh".into()),
            http_timeout: Duration::from_secs(parsed_or("WORKER_HTTP_TIMEOUT_SECS", 30)),
            max_archive_bytes: parsed_or("WORKER_MAX_ARCHIVE_BYTES", 512 * 1024 * 1024),
        })
    }

    /// Development defaults pointing at `server_url`.
    pub fn new(server_url: impl Into<String>, worker_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            worker_id: worker_id.into(),
            shared_secret: secret.into(),
            hostname: None,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            work_dir: env::temp_dir(),
            python: "python3".into(),
            shell: "sh".into(),
            http_timeout: Duration::from_secs(30),
            max_archive_bytes: 512 * 1024 * 1024,
        }
    }
}
