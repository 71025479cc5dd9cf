#![cfg(unix)]

use api::routes::app;
use api::services::intake::{Upload, create_test_setup, submit};
use db::models::submission::{self, SubmissionStatus};
use db::models::test_outcome_collection;
use db::test_utils::setup_test_db;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use util::state::AppState;
use util::storage::FsBlobStore;
use util::worker_auth::{SharedSecret, WorkerAuthSettings};
use worker::Worker;
use worker::config::WorkerConfig;
use worker::error::WorkerError;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const SECRET: &str = "e2e-secret";

const MANIFEST: &str = r#"{
    "schemaVersion": 1,
    "gradingMode": "worker",
    "requiredFiles": ["main.py"],
    "testSuites": [{"tier": "public", "script": "run_tests.sh"}],
    "limits": {"timeLimitSeconds": 10, "memoryLimitMb": 128}
}"#;

const RUN_TESTS: &str = r#"grep -q "return a + b" main.py && status=pass || status=fail
echo "{\"outcomes\": [{\"name\": \"test_add\", \"status\": \"$status\"}]}"
"#;

struct Server {
    state: AppState,
    base_url: String,
    _storage: TempDir,
}

async fn start_server() -> Server {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let storage = TempDir::new().unwrap();
    let state = AppState::new(
        setup_test_db().await,
        Arc::new(SharedSecret::fixed(SECRET)),
        WorkerAuthSettings::default(),
        Arc::new(FsBlobStore::new(storage.path())),
        base_url.clone(),
    );
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Server {
        state,
        base_url,
        _storage: storage,
    }
}

fn bundle() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("run_tests.sh", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(RUN_TESTS.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn worker_config(server: &Server, secret: &str, work_dir: &TempDir) -> WorkerConfig {
    let mut config = WorkerConfig::new(&server.base_url, "w1", secret);
    config.work_dir = work_dir.path().to_path_buf();
    config.backoff_initial = Duration::from_millis(10);
    config.backoff_max = Duration::from_millis(50);
    config
}

async fn seed(server: &Server, source: &str) -> submission::Model {
    let setup = create_test_setup(
        &server.state,
        "Lab",
        MANIFEST,
        &Upload {
            filename: Some("bundle.zip".into()),
            bytes: bundle(),
        },
        None,
    )
    .await
    .unwrap();
    submit(
        &server.state,
        setup.id,
        Some(1),
        &Upload {
            filename: Some("main.py".into()),
            bytes: source.as_bytes().to_vec(),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn worker_grades_and_reports_a_submission() {
    let server = start_server().await;
    let work = TempDir::new().unwrap();
    let sub = seed(&server, "def add(a, b):\n    return a + b\n").await;

    let mut worker = Worker::new(&worker_config(&server, SECRET, &work)).unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), Some(sub.id));
    assert_eq!(worker.poll_once().await.unwrap(), None);

    let db = server.state.db();
    let done = submission::Model::find_by_id(db, sub.id).await.unwrap().unwrap();
    assert_eq!(done.status, SubmissionStatus::Complete);
    assert_eq!(done.worker_id.as_deref(), Some("w1"));

    let rows = test_outcome_collection::Model::find_by_submission(db, sub.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let collection = rows[0].collection().unwrap();
    assert_eq!(collection.counts.passed, 1);
    assert!(collection.runner_version.starts_with("worker/"));
}

#[tokio::test]
async fn missing_required_file_is_reported_as_failed_build() {
    let server = start_server().await;
    let work = TempDir::new().unwrap();

    let setup = create_test_setup(
        &server.state,
        "Lab",
        MANIFEST,
        &Upload {
            filename: Some("bundle.zip".into()),
            bytes: bundle(),
        },
        None,
    )
    .await
    .unwrap();
    let sub = submit(
        &server.state,
        setup.id,
        None,
        &Upload {
            filename: Some("solution.py".into()),
            bytes: b"pass".to_vec(),
        },
    )
    .await
    .unwrap();

    let mut worker = Worker::new(&worker_config(&server, SECRET, &work)).unwrap();
    worker.poll_once().await.unwrap();

    let db = server.state.db();
    let done = submission::Model::find_by_id(db, sub.id).await.unwrap().unwrap();
    assert_eq!(done.status, SubmissionStatus::Complete);
    let rows = test_outcome_collection::Model::find_by_submission(db, sub.id)
        .await
        .unwrap();
    assert_eq!(rows[0].build_status, "failed");
}

#[tokio::test]
async fn wrong_secret_is_unauthorized_and_claims_nothing() {
    let server = start_server().await;
    let work = TempDir::new().unwrap();
    let sub = seed(&server, "def add(a, b):\n    return a + b\n").await;

    let mut worker = Worker::new(&worker_config(&server, "not-the-secret", &work)).unwrap();
    let err = worker.poll_once().await.unwrap_err();
    assert!(matches!(err, WorkerError::Unauthorized));

    let still = submission::Model::find_by_id(server.state.db(), sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still.status, SubmissionStatus::Pending);
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
    let server = start_server().await;
    let work = TempDir::new().unwrap();
    let worker = Worker::new(&worker_config(&server, SECRET, &work)).unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(worker.run(token.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}
