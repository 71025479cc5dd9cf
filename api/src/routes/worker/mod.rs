//! `/api/worker/...`: the endpoints pull-based workers call.
//!
//! Every route here sits behind [`require_worker`], so handlers can rely on an
//! [`AuthenticatedWorker`](util::worker_auth::AuthenticatedWorker) extension.
//! Responses are bare JSON documents, not the `ApiResponse` envelope.

use crate::auth::worker::require_worker;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use util::state::AppState;

pub mod get;
pub mod post;

pub fn worker_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/claim", post(post::claim))
        .route("/results", post(post::submit_result))
        .route(
            "/submissions/{submission_id}/artifact",
            get(get::download_submission),
        )
        .route(
            "/test-setups/{test_setup_id}/artifact",
            get(get::download_test_setup),
        )
        .route_layer(from_fn_with_state(app_state, require_worker))
}
