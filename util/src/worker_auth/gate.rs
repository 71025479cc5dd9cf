use super::{
    ANONYMOUS_WORKER, ActivitySink, AuthError, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    NonceCache, SharedSecret, signing,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct WorkerAuthSettings {
    pub max_clock_skew_seconds: i64,
    pub nonce_ttl_seconds: i64,
    pub required_worker_id: Option<String>,
}

impl Default for WorkerAuthSettings {
    fn default() -> Self {
        Self {
            max_clock_skew_seconds: 60,
            nonce_ttl_seconds: 300,
            required_worker_id: None,
        }
    }
}

impl WorkerAuthSettings {
    pub fn from_config() -> Self {
        let cfg = crate::config::AppConfig::global();
        Self {
            max_clock_skew_seconds: cfg.max_clock_skew_seconds,
            nonce_ttl_seconds: cfg.nonce_ttl_seconds,
            required_worker_id: cfg.required_worker_id.clone(),
        }
    }
}

/// The parts of an HTTP request the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct WorkerRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
    pub timestamp: Option<&'a str>,
    pub nonce: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub worker_id: Option<&'a str>,
}

/// Identity attached to a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedWorker {
    pub worker_id: Option<String>,
}

impl AuthenticatedWorker {
    pub fn label(&self) -> &str {
        self.worker_id.as_deref().unwrap_or(ANONYMOUS_WORKER)
    }
}

/// Verifies signed worker requests.
pub struct WorkerAuthGate {
    secret: Arc<SharedSecret>,
    nonces: NonceCache,
    activity: Arc<dyn ActivitySink>,
    settings: WorkerAuthSettings,
}

impl WorkerAuthGate {
    pub fn new(
        secret: Arc<SharedSecret>,
        activity: Arc<dyn ActivitySink>,
        settings: WorkerAuthSettings,
    ) -> Self {
        Self {
            secret,
            nonces: NonceCache::new(),
            activity,
            settings,
        }
    }

    pub fn secret(&self) -> &Arc<SharedSecret> {
        &self.secret
    }

    pub fn settings(&self) -> &WorkerAuthSettings {
        &self.settings
    }

    /// Runs every check against the current wall clock.
    pub fn verify(&self, req: &WorkerRequest<'_>) -> Result<AuthenticatedWorker, AuthError> {
        self.verify_at(req, Utc::now())
    }

    /// Runs every check in order; the first failure wins.
    pub fn verify_at(
        &self,
        req: &WorkerRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedWorker, AuthError> {
        let secret = self.secret.get().ok_or(AuthError::SecretNotConfigured)?;

        let worker_id = req.worker_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(required) = &self.settings.required_worker_id {
            if worker_id != Some(required.as_str()) {
                return Err(AuthError::WorkerMismatch);
            }
        }

        let timestamp_raw = req
            .timestamp
            .ok_or(AuthError::MissingHeader(HEADER_TIMESTAMP))?
            .trim();
        let timestamp: i64 = timestamp_raw
            .parse()
            .map_err(|_| AuthError::InvalidTimestamp)?;
        let now_secs = now.timestamp();
        let max_skew = u64::try_from(self.settings.max_clock_skew_seconds).unwrap_or(0);
        if now_secs.abs_diff(timestamp) > max_skew {
            return Err(AuthError::StaleTimestamp);
        }

        let nonce = req
            .nonce
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(AuthError::MissingHeader(HEADER_NONCE))?;
        let signature = req
            .signature
            .map(str::trim)
            .ok_or(AuthError::MissingHeader(HEADER_SIGNATURE))?;

        let key = NonceCache::key(worker_id, nonce);
        if !self
            .nonces
            .check_and_insert(&key, now_secs, self.settings.nonce_ttl_seconds)
        {
            return Err(AuthError::ReplayedNonce);
        }

        let canonical = signing::canonical_string(
            req.method,
            req.path,
            &signing::body_hash(req.body),
            timestamp_raw,
            nonce,
        );
        let supplied = hex::decode(signature).map_err(|_| AuthError::MalformedSignature)?;
        if !signing::verify(&secret, &canonical, &supplied) {
            return Err(AuthError::SignatureMismatch);
        }

        let worker = AuthenticatedWorker {
            worker_id: worker_id.map(str::to_string),
        };
        self.activity.mark_active(worker.label(), now);
        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker_auth::{SignedHeaders, WorkerActivity};
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    fn gate_with(settings: WorkerAuthSettings) -> (WorkerAuthGate, Arc<WorkerActivity>) {
        let activity = Arc::new(WorkerActivity::new());
        let gate = WorkerAuthGate::new(
            Arc::new(SharedSecret::fixed(SECRET)),
            activity.clone(),
            settings,
        );
        (gate, activity)
    }

    fn request<'a>(headers: &'a SignedHeaders, body: &'a [u8]) -> WorkerRequest<'a> {
        WorkerRequest {
            method: "POST",
            path: "/api/worker/claim",
            body,
            timestamp: Some(&headers.timestamp),
            nonce: Some(&headers.nonce),
            signature: Some(&headers.signature),
            worker_id: headers.worker_id.as_deref(),
        }
    }

    fn signed(now: DateTime<Utc>, body: &[u8]) -> SignedHeaders {
        SignedHeaders::at(SECRET, Some("w1"), "POST", "/api/worker/claim", body, now.timestamp())
    }

    #[test]
    fn valid_request_passes_and_marks_activity() {
        let (gate, activity) = gate_with(WorkerAuthSettings::default());
        let now = Utc::now();
        let headers = signed(now, b"{}");

        let worker = gate.verify_at(&request(&headers, b"{}"), now).unwrap();
        assert_eq!(worker.worker_id.as_deref(), Some("w1"));
        assert_eq!(activity.last_seen("w1"), Some(now));
    }

    #[test]
    fn unconfigured_secret_rejects_everything() {
        let gate = WorkerAuthGate::new(
            Arc::new(SharedSecret::unconfigured()),
            Arc::new(WorkerActivity::new()),
            WorkerAuthSettings::default(),
        );
        let now = Utc::now();
        let headers = signed(now, b"");
        assert_eq!(
            gate.verify_at(&request(&headers, b""), now),
            Err(AuthError::SecretNotConfigured)
        );
    }

    #[test]
    fn required_worker_id_is_enforced() {
        let (gate, _) = gate_with(WorkerAuthSettings {
            required_worker_id: Some("w2".into()),
            ..Default::default()
        });
        let now = Utc::now();
        let headers = signed(now, b"");
        assert_eq!(
            gate.verify_at(&request(&headers, b""), now),
            Err(AuthError::WorkerMismatch)
        );
    }

    #[test]
    fn replay_is_rejected_until_ttl_expires() {
        let (gate, _) = gate_with(WorkerAuthSettings {
            max_clock_skew_seconds: 1_000,
            nonce_ttl_seconds: 300,
            required_worker_id: None,
        });
        let now = Utc::now();
        let headers = signed(now, b"{}");
        let req = request(&headers, b"{}");

        assert!(gate.verify_at(&req, now).is_ok());
        assert_eq!(
            gate.verify_at(&req, now + Duration::seconds(10)),
            Err(AuthError::ReplayedNonce)
        );
        assert!(gate.verify_at(&req, now + Duration::seconds(301)).is_ok());
    }

    #[test]
    fn stale_and_future_timestamps_are_rejected() {
        let (gate, _) = gate_with(WorkerAuthSettings::default());
        let now = Utc::now();

        let past = signed(now - Duration::seconds(61), b"");
        assert_eq!(
            gate.verify_at(&request(&past, b""), now),
            Err(AuthError::StaleTimestamp)
        );

        let future = signed(now + Duration::seconds(61), b"");
        assert_eq!(
            gate.verify_at(&request(&future, b""), now),
            Err(AuthError::StaleTimestamp)
        );

        let edge = signed(now - Duration::seconds(60), b"");
        assert!(gate.verify_at(&request(&edge, b""), now).is_ok());
    }

    #[test]
    fn any_body_change_breaks_the_signature() {
        let (gate, _) = gate_with(WorkerAuthSettings::default());
        let now = Utc::now();
        let body = br#"{"workerID":"w1"}"#;
        let headers = signed(now, body);

        let mut tampered = body.to_vec();
        tampered[3] ^= 0x01;
        assert_eq!(
            gate.verify_at(&request(&headers, &tampered), now),
            Err(AuthError::SignatureMismatch)
        );
    }

    #[test]
    fn garbled_headers_are_rejected() {
        let (gate, _) = gate_with(WorkerAuthSettings::default());
        let now = Utc::now();
        let headers = signed(now, b"");

        let mut req = request(&headers, b"");
        req.timestamp = Some("yesterday");
        assert_eq!(gate.verify_at(&req, now), Err(AuthError::InvalidTimestamp));

        for extreme in ["-9223372036854775808", "9223372036854775807"] {
            let mut req = request(&headers, b"");
            req.timestamp = Some(extreme);
            assert_eq!(gate.verify_at(&req, now), Err(AuthError::StaleTimestamp));
        }

        let mut req = request(&headers, b"");
        req.nonce = None;
        assert_eq!(
            gate.verify_at(&req, now),
            Err(AuthError::MissingHeader(HEADER_NONCE))
        );

        let fresh = signed(now, b"");
        let mut req = request(&fresh, b"");
        req.signature = Some("zz-not-hex");
        assert_eq!(gate.verify_at(&req, now), Err(AuthError::MalformedSignature));
    }
}
