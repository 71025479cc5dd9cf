use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope used by every web-facing endpoint:
///
/// ```json
/// {
///   "success": true,
///   "data": { "id": 12, "status": "pending" },
///   "message": "Submission queued"
/// }
/// ```
///
/// Worker endpoints do not use it; they return the bare `Job` / receipt documents.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// Error envelope; `data` is `T::default()`.
    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }

    /// Pairs the envelope with a status code.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl ApiResponse<()> {
    pub fn success_without_data(message: impl Into<String>) -> Self {
        Self::success((), message)
    }
}

/// Shorthand for an error envelope with no payload.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    ApiResponse::<()>::error(message).with_status(status)
}
