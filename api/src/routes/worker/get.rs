use super::post::dispatch_failure;
use crate::services::dispatch;
use axum::{
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use util::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

/// GET /api/worker/submissions/{submission_id}/artifact
///
/// Raw stored bytes of the submission. Notebook submissions are merged with the test
/// setup's canonical notebook first, so the authoritative test cells always run.
/// `422` when either notebook cannot be parsed.
pub async fn download_submission(
    State(app_state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Response {
    match dispatch::submission_artifact(&app_state, submission_id).await {
        Ok(bytes) => (StatusCode::OK, [(CONTENT_TYPE, OCTET_STREAM)], bytes).into_response(),
        Err(e) => dispatch_failure(e),
    }
}

/// GET /api/worker/test-setups/{test_setup_id}/artifact
///
/// Raw bytes of the test-setup bundle archive.
pub async fn download_test_setup(
    State(app_state): State<AppState>,
    Path(test_setup_id): Path<i64>,
) -> Response {
    match dispatch::test_setup_artifact(&app_state, test_setup_id).await {
        Ok(bytes) => (StatusCode::OK, [(CONTENT_TYPE, OCTET_STREAM)], bytes).into_response(),
        Err(e) => dispatch_failure(e),
    }
}
