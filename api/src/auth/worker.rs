use crate::response::error_response;
use axum::{
    body::{Body, to_bytes},
    extract::{OriginalUri, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use util::config;
use util::state::AppState;
use util::worker_auth::{
    HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP, HEADER_WORKER_ID, WorkerRequest,
};

/// Body returned for every rejected worker request, whatever the reason.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Verifies the signed-request headers before a worker route runs.
///
/// The body is buffered (up to `MAX_UPLOAD_BYTES`) so it can be hashed, then handed on
/// unchanged. The path that is verified is the full request path, not the suffix a
/// nested router sees. On success an [`AuthenticatedWorker`](util::worker_auth::AuthenticatedWorker)
/// extension is attached to the request.
///
/// Every failure answers `401` with the same body; the reason is only logged.
pub async fn require_worker(
    State(app_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let bytes = match to_bytes(body, config::max_upload_bytes()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "Worker request body could not be read");
            return error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE);
        }
    };

    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let verdict = {
        let request = WorkerRequest {
            method: parts.method.as_str(),
            path: &path,
            body: &bytes,
            timestamp: header(&parts.headers, HEADER_TIMESTAMP),
            nonce: header(&parts.headers, HEADER_NONCE),
            signature: header(&parts.headers, HEADER_SIGNATURE),
            worker_id: header(&parts.headers, HEADER_WORKER_ID),
        };
        app_state.worker_auth().verify(&request)
    };

    match verdict {
        Ok(worker) => {
            tracing::debug!(worker = worker.label(), path = %path, "Worker request authenticated");
            parts.extensions.insert(worker);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(reason) => {
            tracing::debug!(%reason, path = %path, "Worker request rejected");
            error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
        }
    }
}
