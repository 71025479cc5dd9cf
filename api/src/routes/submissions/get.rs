use crate::response::{ApiResponse, error_response};
use crate::services::intake::{self, SubmissionView};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use util::state::AppState;

/// GET /api/submissions/{submission_id}
///
/// Status of one submission plus every result stored for it (worker and preview).
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "submission": { "id": 3, "status": "complete", "attempt_number": 1, ... },
///     "results": [{ "is_preview": false, "received_at": "...", "collection": { ... } }]
///   },
///   "message": "Submission retrieved"
/// }
/// ```
pub async fn get_submission(
    State(app_state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Response {
    match intake::submission_view(&app_state, submission_id).await {
        Ok(view) => ApiResponse::<SubmissionView>::success(view, "Submission retrieved")
            .with_status(StatusCode::OK),
        Err(e) => {
            if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(submission_id, error = %e, "Failed to load submission");
            }
            error_response(e.status(), e.public_message())
        }
    }
}
