mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use helpers::app::{
    SECRET, body_json, make_test_app, make_test_app_with, seed_setup, signed_request,
    WORKER_MANIFEST,
};
use serial_test::serial;
use std::sync::Arc;
use util::config::AppConfig;
use util::state::AppState;
use util::storage::FsBlobStore;
use util::worker_auth::{SharedSecret, SignedHeaders, WorkerAuthSettings};

async fn assert_unauthorized(resp: axum::response::Response) {
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "unauthorized");
}

#[tokio::test]
async fn unsigned_request_is_rejected() {
    let app = make_test_app().await;
    let req = Request::post("/api/worker/claim")
        .body(Body::from("{}"))
        .unwrap();
    assert_unauthorized(app.send(req).await).await;
}

#[tokio::test]
async fn replayed_headers_are_rejected() {
    let app = make_test_app().await;
    let body = b"{\"workerID\":\"w1\"}".to_vec();
    let headers = SignedHeaders::now(SECRET, Some("w1"), "POST", "/api/worker/claim", &body);

    let first = app
        .send(signed_request("POST", "/api/worker/claim", body.clone(), &headers))
        .await;
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let replay = app
        .send(signed_request("POST", "/api/worker/claim", body, &headers))
        .await;
    assert_unauthorized(replay).await;
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let app = make_test_app().await;
    let headers = SignedHeaders::now(
        SECRET,
        Some("w1"),
        "POST",
        "/api/worker/claim",
        b"{\"workerID\":\"w1\"}",
    );
    let resp = app
        .send(signed_request(
            "POST",
            "/api/worker/claim",
            b"{\"workerID\":\"w2\"}".to_vec(),
            &headers,
        ))
        .await;
    assert_unauthorized(resp).await;
}

#[tokio::test]
async fn signature_covers_the_full_path() {
    let app = make_test_app().await;
    // Signed for the suffix a nested router would see, not the real path.
    let headers = SignedHeaders::now(SECRET, Some("w1"), "POST", "/claim", b"");
    let resp = app
        .send(signed_request("POST", "/api/worker/claim", Vec::new(), &headers))
        .await;
    assert_unauthorized(resp).await;
}

#[tokio::test]
async fn stale_timestamp_is_rejected_even_when_correctly_signed() {
    let app = make_test_app().await;
    let past = Utc::now().timestamp() - 120;
    let headers = SignedHeaders::at(SECRET, Some("w1"), "POST", "/api/worker/claim", b"", past);
    let resp = app
        .send(signed_request("POST", "/api/worker/claim", Vec::new(), &headers))
        .await;
    assert_unauthorized(resp).await;
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let app = make_test_app().await;
    let headers = SignedHeaders::now("not-the-secret", Some("w1"), "POST", "/api/worker/claim", b"");
    let resp = app
        .send(signed_request("POST", "/api/worker/claim", Vec::new(), &headers))
        .await;
    assert_unauthorized(resp).await;
}

#[tokio::test]
async fn unconfigured_secret_refuses_everything() {
    let app = make_test_app_with(SharedSecret::unconfigured(), WorkerAuthSettings::default()).await;
    let resp = app
        .send_signed("POST", "/api/worker/claim", Vec::new(), Some("w1"))
        .await;
    assert_unauthorized(resp).await;
}

#[tokio::test]
async fn rejected_requests_do_not_touch_the_queue() {
    let app = make_test_app().await;
    let setup = seed_setup(&app, WORKER_MANIFEST, None).await;
    api::services::intake::submit(
        &app.state,
        setup.id,
        None,
        &api::services::intake::Upload {
            filename: Some("main.py".into()),
            bytes: b"x".to_vec(),
        },
    )
    .await
    .unwrap();

    let headers = SignedHeaders::now("wrong", Some("w1"), "POST", "/api/worker/claim", b"");
    let resp = app
        .send(signed_request("POST", "/api/worker/claim", Vec::new(), &headers))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let pending = db::models::submission::Model::count_with_status(
        app.state.db(),
        db::models::submission::SubmissionStatus::Pending,
    )
    .await
    .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn rotated_secret_takes_effect_immediately() {
    let app = make_test_app().await;
    app.state.worker_auth().secret().set("rotated").unwrap();

    let old = app
        .send_signed("POST", "/api/worker/claim", Vec::new(), Some("w1"))
        .await;
    assert_unauthorized(old).await;

    let headers = SignedHeaders::now("rotated", Some("w1"), "POST", "/api/worker/claim", b"");
    let resp = app
        .send(signed_request("POST", "/api/worker/claim", Vec::new(), &headers))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn successful_requests_show_up_in_health() {
    let app = make_test_app().await;
    app.send_signed("POST", "/api/worker/claim", Vec::new(), Some("w-health"))
        .await;

    let resp = app
        .send(Request::get("/api/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["status"], "OK");
    assert_eq!(json["data"]["worker_secret_configured"], true);
    assert_eq!(json["data"]["workers"][0]["worker_id"], "w-health");
}

#[tokio::test]
#[serial]
async fn required_worker_id_from_config_is_enforced() {
    AppConfig::set_required_worker_id(Some("only-me".into()));
    AppConfig::set_public_base_url("http://configured:9000");

    let db = db::test_utils::setup_test_db().await;
    let storage = tempfile::TempDir::new().unwrap();
    let state = AppState::new(
        db,
        Arc::new(SharedSecret::fixed(SECRET)),
        WorkerAuthSettings::from_config(),
        Arc::new(FsBlobStore::new(storage.path())),
        util::config::public_base_url(),
    );
    let router = api::routes::app(state.clone());
    AppConfig::reset();

    assert_eq!(state.public_base_url(), "http://configured:9000");

    use tower::ServiceExt;
    let other = SignedHeaders::now(SECRET, Some("someone-else"), "POST", "/api/worker/claim", b"");
    let resp = router
        .clone()
        .oneshot(signed_request("POST", "/api/worker/claim", Vec::new(), &other))
        .await
        .unwrap();
    assert_unauthorized(resp).await;

    let me = SignedHeaders::now(SECRET, Some("only-me"), "POST", "/api/worker/claim", b"");
    let resp = router
        .oneshot(signed_request("POST", "/api/worker/claim", Vec::new(), &me))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
