//! Mutual authentication between workers and the dispatch server.
//!
//! Every worker request carries a timestamp, a single-use nonce and an
//! HMAC-SHA256 signature over a canonical description of the request. The
//! server side ([`WorkerAuthGate`]) checks freshness, replay and signature; the
//! worker side uses [`SignedHeaders`] to produce the same headers.

pub mod activity;
pub mod gate;
pub mod nonce;
pub mod secret;
pub mod signing;

pub use activity::{ActivitySink, WorkerActivity};
pub use gate::{AuthenticatedWorker, WorkerAuthGate, WorkerAuthSettings, WorkerRequest};
pub use nonce::NonceCache;
pub use secret::SharedSecret;
pub use signing::SignedHeaders;

use thiserror::Error;

pub const HEADER_TIMESTAMP: &str = "x-worker-timestamp";
pub const HEADER_NONCE: &str = "x-worker-nonce";
pub const HEADER_SIGNATURE: &str = "x-worker-signature";
pub const HEADER_WORKER_ID: &str = "x-worker-id";

/// Marker used in nonce keys and activity records when no worker id is supplied.
pub const ANONYMOUS_WORKER: &str = "anonymous";

/// Why a worker request was refused.
///
/// Only ever logged. Clients see a uniform "unauthorized" response whatever the variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("worker shared secret is not configured")]
    SecretNotConfigured,
    #[error("worker id does not match the required worker")]
    WorkerMismatch,
    #[error("missing header {0}")]
    MissingHeader(&'static str),
    #[error("timestamp is not an integer")]
    InvalidTimestamp,
    #[error("timestamp outside the allowed clock skew")]
    StaleTimestamp,
    #[error("nonce already used")]
    ReplayedNonce,
    #[error("signature is not valid hex")]
    MalformedSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
}
