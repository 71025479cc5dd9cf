use crate::response::error_response;
use crate::services::dispatch::{self, DispatchError};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use util::job::{ClaimRequest, ResultReceipt};
use util::state::AppState;
use util::worker_auth::{ANONYMOUS_WORKER, AuthenticatedWorker};

pub(super) fn dispatch_failure(err: DispatchError) -> Response {
    if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Worker request failed");
    } else {
        tracing::debug!(error = %err, "Worker request refused");
    }
    error_response(err.status(), err.public_message())
}

/// POST /api/worker/claim
///
/// Body: `{ "workerID": "w1", "hostname": "box-3" }` (may be empty).
///
/// - `200 OK` with a `Job` document when a submission was claimed
/// - `204 No Content` when nothing is pending
/// - `422` when the body is not a claim request
///
/// The verified `X-Worker-Id` header takes precedence over `workerID` in the body.
pub async fn claim(
    State(app_state): State<AppState>,
    Extension(worker): Extension<AuthenticatedWorker>,
    body: Bytes,
) -> Response {
    let request: Option<ClaimRequest> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => Some(req),
            Err(e) => {
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("malformed claim request: {e}"),
                );
            }
        }
    };

    let body_worker = request
        .as_ref()
        .map(|r| r.worker_id.trim())
        .filter(|id| !id.is_empty());
    let worker_id = match (worker.worker_id.as_deref(), body_worker) {
        (Some(header), Some(body)) if header != body => {
            tracing::warn!(header, body, "Claim body workerID differs from header; using header");
            header
        }
        (Some(header), _) => header,
        (None, Some(body)) => body,
        (None, None) => ANONYMOUS_WORKER,
    };
    let hostname = request.as_ref().and_then(|r| r.hostname.as_deref());

    match dispatch::claim_job(&app_state, worker_id, hostname).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => dispatch_failure(e),
    }
}

/// POST /api/worker/results
///
/// Body: a `TestOutcomeCollection` document.
///
/// - `200 OK` `{ "received": true }`, also for repeated reports and unknown submissions
/// - `422` when the document is malformed or inconsistent (message returned verbatim)
pub async fn submit_result(
    State(app_state): State<AppState>,
    Extension(worker): Extension<AuthenticatedWorker>,
    body: Bytes,
) -> Response {
    match dispatch::ingest_result(&app_state, &body).await {
        Ok(ingested) => {
            if !ingested.stored {
                tracing::info!(worker = worker.label(), "Duplicate result ignored");
            }
            (StatusCode::OK, Json(ResultReceipt { received: true })).into_response()
        }
        Err(e) => dispatch_failure(e),
    }
}
