use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::TypedHeader;
use headers::UserAgent;
use std::net::SocketAddr;
use tracing::info;
use util::worker_auth::HEADER_WORKER_ID;

/// Logs method, path, client IP, worker id and user-agent for each request.
///
/// CORS preflight `OPTIONS` requests are passed through without logging. The worker id
/// is taken from the `X-Worker-Id` header as sent, before any verification, so treat it
/// as a hint only.
///
/// ```ignore
/// let app = Router::new().layer(axum::middleware::from_fn(log_request));
/// ```
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        let req = Request::from_parts(parts, body);
        return Ok(next.run(req).await);
    }

    let worker = parts
        .headers
        .get(HEADER_WORKER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let user_agent = TypedHeader::<UserAgent>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|TypedHeader(ua)| ua.to_string());

    info!(
        method = ?parts.method,
        path = %parts.uri.path(),
        ip = %addr.ip(),
        worker = worker.as_deref().unwrap_or("-"),
        user_agent = user_agent.unwrap_or_else(|| "unknown".into()),
        "Incoming request"
    );

    let req = Request::from_parts(parts, body);
    let response = next.run(req).await;
    tracing::debug!(status = %response.status(), "Request finished");
    Ok(response)
}
