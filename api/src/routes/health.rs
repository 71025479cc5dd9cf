use crate::response::ApiResponse;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use util::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize, Default)]
pub struct HealthData {
    pub status: &'static str,
    pub worker_secret_configured: bool,
    /// Workers seen since startup, most recent first.
    pub workers: Vec<WorkerSeen>,
}

#[derive(Debug, Serialize)]
pub struct WorkerSeen {
    pub worker_id: String,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

/// GET /api/health
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "status": "OK",
///     "worker_secret_configured": true,
///     "workers": [{ "worker_id": "w1", "last_seen": "2026-01-01T00:00:00Z" }]
///   },
///   "message": "Health check passed"
/// }
/// ```
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let workers = app_state
        .activity()
        .snapshot()
        .into_iter()
        .map(|(worker_id, last_seen)| WorkerSeen {
            worker_id,
            last_seen,
        })
        .collect();

    Json(ApiResponse::success(
        HealthData {
            status: "OK",
            worker_secret_configured: app_state.worker_auth().secret().is_configured(),
            workers,
        },
        "Health check passed",
    ))
}
