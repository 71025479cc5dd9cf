use crate::response::{ApiResponse, error_response};
use crate::routes::common::FormParts;
use crate::services::intake::{self, IntakeError};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
};
use db::models::{submission, test_setup};
use serde::Serialize;
use util::state::AppState;

pub(super) fn intake_failure(err: IntakeError) -> Response {
    if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Intake request failed");
    }
    error_response(err.status(), err.public_message())
}

async fn read_form(multipart: &mut Multipart) -> Result<FormParts, Response> {
    FormParts::read(multipart).await.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid multipart body: {e}"),
        )
    })
}

fn user_id(form: &FormParts) -> Result<Option<i64>, Response> {
    form.optional_i64("user_id")
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "user_id must be an integer"))
}

/// POST /api/test-setups
///
/// ### Request Body (Multipart Form Data)
/// - `name` (text, optional)
/// - `manifest` (text or file, required): manifest JSON
/// - `bundle` (file, required): test bundle archive
/// - `notebook` (file, optional): canonical instructor notebook
///
/// ### Responses
/// - `201 Created` with the stored test setup
/// - `400 Bad Request` for a missing field
/// - `422 Unprocessable Entity` for an invalid manifest or notebook, message verbatim
pub async fn create_test_setup(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let Some(manifest) = form.text("manifest") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: manifest");
    };
    let Some(bundle) = form.file("bundle") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: bundle");
    };
    let name = form.text("name").unwrap_or_else(|| "Untitled".to_string());

    match intake::create_test_setup(&app_state, &name, &manifest, bundle, form.file("notebook"))
        .await
    {
        Ok(setup) => ApiResponse::<test_setup::Model>::success(setup, "Test setup created")
            .with_status(StatusCode::CREATED),
        Err(e) => intake_failure(e),
    }
}

/// POST /api/test-setups/{test_setup_id}/submissions
///
/// ### Request Body (Multipart Form Data)
/// - `file` (file, required)
/// - `user_id` (text, optional)
///
/// ### Responses
/// - `201 Created` with the `pending` submission
/// - `404 Not Found` when the test setup does not exist
pub async fn submit(
    State(app_state): State<AppState>,
    Path(test_setup_id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let user_id = match user_id(&form) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(file) = form.file("file") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing file upload");
    };

    match intake::submit(&app_state, test_setup_id, user_id, file).await {
        Ok(sub) => ApiResponse::<submission::Model>::success(sub, "Submission queued")
            .with_status(StatusCode::CREATED),
        Err(e) => intake_failure(e),
    }
}

#[derive(Debug, Serialize)]
pub struct BrowserPreviewResponse {
    pub preview: submission::Model,
    pub rerun: submission::Model,
}

/// POST /api/test-setups/{test_setup_id}/browser-results
///
/// Records results graded in the browser and queues an authoritative worker re-run of
/// the same artifact.
///
/// ### Request Body (Multipart Form Data)
/// - `file` (file, required): the graded artifact
/// - `results` (text or file, required): `TestOutcomeCollection` JSON; its ids are
///   replaced by the ones the server assigns
/// - `user_id` (text, optional)
///
/// ### Responses
/// - `201 Created` with `{ preview, rerun }`
/// - `422` when the results are malformed or the setup is not browser-graded
pub async fn browser_results(
    State(app_state): State<AppState>,
    Path(test_setup_id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let user_id = match user_id(&form) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(file) = form.file("file") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing file upload");
    };
    let Some(results) = form.file("results") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: results");
    };

    match intake::record_browser_preview(&app_state, test_setup_id, user_id, file, &results.bytes)
        .await
    {
        Ok((preview, rerun)) => ApiResponse::success(
            BrowserPreviewResponse { preview, rerun },
            "Preview recorded",
        )
        .with_status(StatusCode::CREATED),
        Err(e) => intake_failure(e),
    }
}
