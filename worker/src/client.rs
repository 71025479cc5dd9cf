//! Signed HTTP client for the dispatch server's worker endpoints.

use crate::error::WorkerError;
use reqwest::{Method, StatusCode, Url};
use util::job::{ClaimRequest, Job, ResultReceipt};
use util::test_outcome::TestOutcomeCollection;
use util::worker_auth::SignedHeaders;

pub struct DispatchClient {
    http: reqwest::Client,
    base_url: String,
    worker_id: String,
    hostname: Option<String>,
    secret: String,
}

impl DispatchClient {
    pub fn new(
        base_url: &str,
        worker_id: &str,
        hostname: Option<String>,
        secret: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            worker_id: worker_id.to_string(),
            hostname,
            secret: secret.to_string(),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Asks for the oldest pending submission. `None` when nothing is queued.
    pub async fn claim(&self) -> Result<Option<Job>, WorkerError> {
        let body = serde_json::to_vec(&ClaimRequest {
            worker_id: self.worker_id.clone(),
            hostname: self.hostname.clone(),
        })?;
        let url = format!("{}/api/worker/claim", self.base_url);

        let resp = self.send(Method::POST, &url, body).await?;
        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => Ok(Some(serde_json::from_slice(&resp.bytes().await?)?)),
            _ => Err(unexpected(resp, &url).await),
        }
    }

    /// Fetches one of the artifact URLs carried by a [`Job`].
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, WorkerError> {
        let resp = self.send(Method::GET, url, Vec::new()).await?;
        if resp.status() != StatusCode::OK {
            return Err(unexpected(resp, url).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn submit_result(
        &self,
        collection: &TestOutcomeCollection,
    ) -> Result<ResultReceipt, WorkerError> {
        let body = serde_json::to_vec(collection)?;
        let url = format!("{}/api/worker/results", self.base_url);

        let resp = self.send(Method::POST, &url, body).await?;
        if resp.status() != StatusCode::OK {
            return Err(unexpected(resp, &url).await);
        }
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    /// Signs over the URL's path, which is what the server verifies.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, WorkerError> {
        let parsed =
            Url::parse(url).map_err(|e| WorkerError::Config(format!("invalid url {url}: {e}")))?;
        let signed = SignedHeaders::now(
            &self.secret,
            Some(&self.worker_id),
            method.as_str(),
            parsed.path(),
            &body,
        );

        let mut request = self
            .http
            .request(method, parsed)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in signed.pairs() {
            request = request.header(name, value);
        }

        let resp = request.body(body).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(WorkerError::Unauthorized);
        }
        Ok(resp)
    }
}

async fn unexpected(resp: reqwest::Response, url: &str) -> WorkerError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    WorkerError::Status {
        status,
        url: url.to_string(),
        body,
    }
}
