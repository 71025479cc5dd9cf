use super::post::intake_failure;
use crate::services::intake;
use axum::{
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use util::state::AppState;

/// GET /api/test-setups/{test_setup_id}/notebook
///
/// The canonical notebook as a student sees it: `secret` and `release` test cells are
/// removed, everything else is returned as stored.
///
/// - `200 OK` with the notebook JSON
/// - `404 Not Found` when the setup or its notebook is missing
/// - `422` when the stored notebook cannot be parsed
pub async fn student_notebook(
    State(app_state): State<AppState>,
    Path(test_setup_id): Path<i64>,
) -> Response {
    match intake::student_notebook(&app_state, test_setup_id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/x-ipynb+json")],
            bytes,
        )
            .into_response(),
        Err(e) => intake_failure(e),
    }
}
