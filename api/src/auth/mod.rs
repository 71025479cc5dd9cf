//! Request-level guards and logging.
//!
//! - [`worker::require_worker`] gates every `/api/worker/...` route behind the signed-request check.
//! - [`middleware::log_request`] logs each incoming request.

pub mod middleware;
pub mod worker;
