use api::routes::app;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use db::models::test_setup;
use db::test_utils::setup_test_db;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use util::state::AppState;
use util::storage::FsBlobStore;
use util::worker_auth::{SharedSecret, SignedHeaders, WorkerAuthSettings};

pub const SECRET: &str = "integration-secret";
pub const BASE_URL: &str = "http://testserver";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _storage: TempDir,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Sends a request signed the way a worker would sign it.
    pub async fn send_signed(
        &self,
        method: &str,
        path: &str,
        body: Vec<u8>,
        worker_id: Option<&str>,
    ) -> Response<Body> {
        let headers = SignedHeaders::now(SECRET, worker_id, method, path, &body);
        self.send(signed_request(method, path, body, &headers)).await
    }
}

pub fn signed_request(
    method: &str,
    path: &str,
    body: Vec<u8>,
    headers: &SignedHeaders,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    for (name, value) in headers.pairs() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn make_test_app() -> TestApp {
    make_test_app_with(SharedSecret::fixed(SECRET), WorkerAuthSettings::default()).await
}

pub async fn make_test_app_with(secret: SharedSecret, settings: WorkerAuthSettings) -> TestApp {
    let db = setup_test_db().await;
    let storage = TempDir::new().unwrap();
    let state = AppState::new(
        db,
        Arc::new(secret),
        settings,
        Arc::new(FsBlobStore::new(storage.path())),
        BASE_URL,
    );
    TestApp {
        router: app(state.clone()),
        state,
        _storage: storage,
    }
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

pub const WORKER_MANIFEST: &str = r#"{
    "schemaVersion": 1,
    "gradingMode": "worker",
    "requiredFiles": ["main.py"],
    "testSuites": [{"tier": "public", "script": "run_tests.sh"}],
    "limits": {"timeLimitSeconds": 10, "memoryLimitMb": 128}
}"#;

pub const BROWSER_MANIFEST: &str = r#"{
    "schemaVersion": 1,
    "gradingMode": "browser",
    "testSuites": [{"tier": "public", "module": "tests.public"}]
}"#;

/// Creates a test setup directly through the intake service.
pub async fn seed_setup(
    app: &TestApp,
    manifest: &str,
    notebook: Option<&[u8]>,
) -> test_setup::Model {
    use api::services::intake::{Upload, create_test_setup};

    let bundle = Upload {
        filename: Some("bundle.zip".into()),
        bytes: b"PK-bundle-bytes".to_vec(),
    };
    let notebook = notebook.map(|bytes| Upload {
        filename: Some("notebook.ipynb".into()),
        bytes: bytes.to_vec(),
    });
    create_test_setup(&app.state, "Lab", manifest, &bundle, notebook.as_ref())
        .await
        .unwrap()
}

pub fn passing_result(submission_id: i64, test_setup_id: i64) -> Vec<u8> {
    serde_json::json!({
        "submissionID": submission_id,
        "testSetupID": test_setup_id,
        "attemptNumber": 1,
        "buildStatus": "passed",
        "outcomes": [{
            "name": "test_add",
            "tier": "public",
            "status": "pass",
            "shortResult": "ok",
            "durationMs": 5,
            "attemptNumber": 1,
            "firstPass": true
        }],
        "wallTimeMs": 40,
        "runnerVersion": "test",
        "timestamp": "2026-01-01T00:00:00Z"
    })
    .to_string()
    .into_bytes()
}
