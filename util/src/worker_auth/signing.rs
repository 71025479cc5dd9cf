use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex SHA-256 of the raw request body.
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// `METHOD\nPATH\nbodyHash\ntimestamp\nnonce`
pub fn canonical_string(
    method: &str,
    path: &str,
    body_hash: &str,
    timestamp: &str,
    nonce: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path,
        body_hash,
        timestamp,
        nonce
    )
}

fn mac_for(secret: &str, canonical: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(canonical.as_bytes());
    mac
}

/// Hex-encoded HMAC-SHA256 of the canonical string.
pub fn sign(secret: &str, canonical: &str) -> String {
    hex::encode(mac_for(secret, canonical).finalize().into_bytes())
}

/// Constant-time comparison of a raw signature against the expected MAC.
pub fn verify(secret: &str, canonical: &str, signature: &[u8]) -> bool {
    mac_for(secret, canonical).verify_slice(signature).is_ok()
}

/// 128 random bits, hex encoded.
pub fn generate_nonce() -> String {
    let mut buf = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// The header values a worker attaches to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
    pub worker_id: Option<String>,
}

impl SignedHeaders {
    /// Signs a request with a fresh nonce and the given timestamp.
    pub fn at(
        secret: &str,
        worker_id: Option<&str>,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
    ) -> Self {
        Self::with_nonce(secret, worker_id, method, path, body, timestamp, generate_nonce())
    }

    /// Signs a request with the current time.
    pub fn now(
        secret: &str,
        worker_id: Option<&str>,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Self {
        Self::at(secret, worker_id, method, path, body, chrono::Utc::now().timestamp())
    }

    pub fn with_nonce(
        secret: &str,
        worker_id: Option<&str>,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
        nonce: String,
    ) -> Self {
        let timestamp = timestamp.to_string();
        let canonical = canonical_string(method, path, &body_hash(body), &timestamp, &nonce);
        Self {
            signature: sign(secret, &canonical),
            timestamp,
            nonce,
            worker_id: worker_id.map(str::to_string),
        }
    }

    /// `(header-name, value)` pairs ready to attach to an HTTP request.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (super::HEADER_TIMESTAMP, self.timestamp.clone()),
            (super::HEADER_NONCE, self.nonce.clone()),
            (super::HEADER_SIGNATURE, self.signature.clone()),
        ];
        if let Some(id) = &self.worker_id {
            pairs.push((super::HEADER_WORKER_ID, id.clone()));
        }
        pairs
    }
}
