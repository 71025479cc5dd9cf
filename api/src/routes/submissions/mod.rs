use axum::{Router, routing::get};
use util::state::AppState;

pub mod get;

pub fn submission_routes() -> Router<AppState> {
    Router::new().route("/{submission_id}", get(get::get_submission))
}
