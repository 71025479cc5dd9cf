use axum::{
    Router,
    routing::{get, post},
};
use util::state::AppState;

pub mod get;
pub mod post;

pub fn test_setup_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(post::create_test_setup))
        .route("/{test_setup_id}/submissions", post(post::submit))
        .route("/{test_setup_id}/browser-results", post(post::browser_results))
        .route("/{test_setup_id}/notebook", get(get::student_notebook))
}
