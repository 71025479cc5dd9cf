//! Application state container shared across Axum route handlers and services.
//!
//! Holds the database connection, the worker authentication gate, the
//! last-seen activity map and the artifact store. It is cheap to clone and is
//! passed into handlers via Axum's `State<T>` extractor.

use crate::storage::{BlobStore, FsBlobStore};
use crate::worker_auth::{SharedSecret, WorkerActivity, WorkerAuthGate, WorkerAuthSettings};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Central application state shared across the server.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    worker_auth: Arc<WorkerAuthGate>,
    activity: Arc<WorkerActivity>,
    storage: Arc<dyn BlobStore>,
    public_base_url: String,
}

impl AppState {
    /// Wires up state from explicit parts.
    ///
    /// The gate reports successful worker requests into the same
    /// [`WorkerActivity`] map that [`AppState::activity`] exposes.
    pub fn new(
        db: DatabaseConnection,
        secret: Arc<SharedSecret>,
        settings: WorkerAuthSettings,
        storage: Arc<dyn BlobStore>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let activity = Arc::new(WorkerActivity::new());
        let worker_auth = Arc::new(WorkerAuthGate::new(secret, activity.clone(), settings));
        Self {
            db,
            worker_auth,
            activity,
            storage,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// State built from the global [`AppConfig`](crate::config::AppConfig).
    pub fn from_config(db: DatabaseConnection, secret: Arc<SharedSecret>) -> Self {
        Self::new(
            db,
            secret,
            WorkerAuthSettings::from_config(),
            Arc::new(FsBlobStore::from_config()),
            crate::config::public_base_url(),
        )
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn worker_auth(&self) -> &WorkerAuthGate {
        &self.worker_auth
    }

    pub fn activity(&self) -> &WorkerActivity {
        &self.activity
    }

    /// Owned handle so blob I/O can run off the async runtime.
    pub fn storage(&self) -> Arc<dyn BlobStore> {
        self.storage.clone()
    }

    /// Base URL embedded in job artifact links, without a trailing slash.
    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}

impl AppState {
    /// Returns a cloned copy of the database connection.
    ///
    /// Useful for async contexts or spawning tasks that require ownership.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }
}
