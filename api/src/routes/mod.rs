//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness check (public)
//! - `/worker` → claim, result and artifact endpoints (signed worker requests only)
//! - `/test-setups` → test-setup upload, submissions, browser previews, student notebook
//! - `/submissions` → submission status and stored results

use crate::routes::{
    health::health_routes, submissions::submission_routes, test_setups::test_setup_routes,
    worker::worker_routes,
};
use axum::{Router, extract::DefaultBodyLimit};
use util::{config, state::AppState};

pub mod common;
pub mod health;
pub mod submissions;
pub mod test_setups;
pub mod worker;

/// Builds every `/api` route with its state applied.
///
/// The body limit is raised to `MAX_UPLOAD_BYTES` for uploads and worker results.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/worker", worker_routes(app_state.clone()))
        .nest("/test-setups", test_setup_routes())
        .nest("/submissions", submission_routes())
        .layer(DefaultBodyLimit::max(config::max_upload_bytes()))
        .with_state(app_state)
}

/// The full application router: everything above mounted under `/api`.
pub fn app(app_state: AppState) -> Router {
    Router::new().nest("/api", routes(app_state))
}
