mod helpers;

use axum::http::StatusCode;
use db::models::submission::{self, SubmissionStatus};
use helpers::app::{
    BASE_URL, WORKER_MANIFEST, body_bytes, body_json, make_test_app, passing_result, seed_setup,
};
use helpers::multipart::multipart_request;
use serde_json::json;
use util::job::Job;

#[tokio::test]
async fn submission_moves_from_pending_to_complete() {
    let app = make_test_app().await;
    let setup = seed_setup(&app, WORKER_MANIFEST, None).await;

    // Intake.
    let resp = app
        .send(multipart_request(
            &format!("/api/test-setups/{}/submissions", setup.id),
            &[
                ("file", Some("main.py"), b"print('hi')".as_slice()),
                ("user_id", None, b"5".as_slice()),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["attempt_number"], 1);
    let submission_id = json["data"]["id"].as_i64().unwrap();

    // Claim.
    let claim_body = json!({"workerID": "w1", "hostname": "box-1"}).to_string();
    let resp = app
        .send_signed("POST", "/api/worker/claim", claim_body.into_bytes(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let job: Job = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(job.submission_id, submission_id);
    assert_eq!(job.test_setup_id, setup.id);
    assert_eq!(job.attempt_number, 1);
    assert_eq!(
        job.submission_url,
        format!("{BASE_URL}/api/worker/submissions/{submission_id}/artifact")
    );
    assert_eq!(job.submission_filename.as_deref(), Some("main.py"));
    assert_eq!(job.manifest.required_files, vec!["main.py"]);

    let assigned = submission::Model::find_by_id(app.state.db(), submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assigned.status, SubmissionStatus::Assigned);
    assert_eq!(assigned.worker_id.as_deref(), Some("w1"));
    assert_eq!(assigned.worker_hostname.as_deref(), Some("box-1"));
    assert!(assigned.assigned_at.is_some());

    // Artifacts.
    let path = format!("/api/worker/submissions/{submission_id}/artifact");
    let resp = app.send_signed("GET", &path, Vec::new(), Some("w1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"print('hi')");

    let path = format!("/api/worker/test-setups/{}/artifact", setup.id);
    let resp = app.send_signed("GET", &path, Vec::new(), Some("w1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"PK-bundle-bytes");

    // Result.
    let resp = app
        .send_signed(
            "POST",
            "/api/worker/results",
            passing_result(submission_id, setup.id),
            Some("w1"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"received": true}));

    let done = submission::Model::find_by_id(app.state.db(), submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, SubmissionStatus::Complete);

    // Nothing left to claim.
    let resp = app
        .send_signed("POST", "/api/worker/claim", b"{\"workerID\":\"w1\"}".to_vec(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // Status view.
    let resp = app
        .send(
            axum::http::Request::get(format!("/api/submissions/{submission_id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["submission"]["status"], "complete");
    assert_eq!(json["data"]["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["results"][0]["collection"]["counts"]["passed"], 1);
}

#[tokio::test]
async fn duplicate_result_is_acknowledged_but_stored_once() {
    let app = make_test_app().await;
    let setup = seed_setup(&app, WORKER_MANIFEST, None).await;
    let sub = api::services::intake::submit(
        &app.state,
        setup.id,
        None,
        &api::services::intake::Upload {
            filename: Some("main.py".into()),
            bytes: b"x = 1".to_vec(),
        },
    )
    .await
    .unwrap();

    let resp = app
        .send_signed("POST", "/api/worker/claim", Vec::new(), Some("w9"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    for _ in 0..2 {
        let resp = app
            .send_signed(
                "POST",
                "/api/worker/results",
                passing_result(sub.id, setup.id),
                Some("w9"),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["received"], true);
    }

    let rows = db::models::test_outcome_collection::Model::find_by_submission(app.state.db(), sub.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn result_for_unknown_submission_is_accepted() {
    let app = make_test_app().await;

    let resp = app
        .send_signed("POST", "/api/worker/results", passing_result(999, 1), None)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["received"], true);

    let outcomes = db::models::test_outcome_collection::Model::find_orphaned(app.state.db(), 999)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    let accepted =
        db::models::test_outcome_collection::Model::find_by_submission(app.state.db(), 999)
            .await
            .unwrap();
    assert!(accepted.is_empty());
}

#[tokio::test]
async fn early_result_does_not_displace_the_real_one() {
    let app = make_test_app().await;

    // A report for an id that has not been handed out yet.
    let mut stray: serde_json::Value = serde_json::from_slice(&passing_result(1, 1)).unwrap();
    stray["outcomes"][0]["name"] = json!("test_stray");
    let resp = app
        .send_signed("POST", "/api/worker/results", stray.to_string().into_bytes(), Some("w2"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let setup = seed_setup(&app, WORKER_MANIFEST, None).await;
    let sub = api::services::intake::submit(
        &app.state,
        setup.id,
        None,
        &api::services::intake::Upload {
            filename: Some("main.py".into()),
            bytes: b"x = 1".to_vec(),
        },
    )
    .await
    .unwrap();
    assert_eq!(sub.id, 1);

    let resp = app
        .send_signed("POST", "/api/worker/claim", Vec::new(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut real: serde_json::Value =
        serde_json::from_slice(&passing_result(sub.id, setup.id)).unwrap();
    real["outcomes"][0]["name"] = json!("test_real");
    let resp = app
        .send_signed("POST", "/api/worker/results", real.to_string().into_bytes(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let done = submission::Model::find_by_id(app.state.db(), sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, SubmissionStatus::Complete);

    let rows = db::models::test_outcome_collection::Model::find_by_submission(app.state.db(), sub.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let saved = rows[0].collection().unwrap();
    assert_eq!(saved.outcomes.len(), 1);
    assert_eq!(saved.outcomes[0].name, "test_real");
}

#[tokio::test]
async fn malformed_result_is_rejected_with_reason() {
    let app = make_test_app().await;

    let failed_with_outcomes = json!({
        "submissionID": 1,
        "testSetupID": 1,
        "attemptNumber": 1,
        "buildStatus": "failed",
        "compilerOutput": "SyntaxError",
        "outcomes": [{"name": "t", "tier": "public", "status": "fail", "attemptNumber": 1}],
        "timestamp": "2026-01-01T00:00:00Z"
    })
    .to_string();
    let resp = app
        .send_signed(
            "POST",
            "/api/worker/results",
            failed_with_outcomes.into_bytes(),
            Some("w1"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("buildStatus is failed")
    );

    let resp = app
        .send_signed("POST", "/api/worker/results", b"not json".to_vec(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn failed_build_still_completes_submission() {
    let app = make_test_app().await;
    let setup = seed_setup(&app, WORKER_MANIFEST, None).await;
    let sub = api::services::intake::submit(
        &app.state,
        setup.id,
        Some(1),
        &api::services::intake::Upload {
            filename: Some("main.py".into()),
            bytes: b"def broken(:".to_vec(),
        },
    )
    .await
    .unwrap();
    app.send_signed("POST", "/api/worker/claim", Vec::new(), Some("w1"))
        .await;

    let failed = json!({
        "submissionID": sub.id,
        "testSetupID": setup.id,
        "attemptNumber": 1,
        "buildStatus": "failed",
        "compilerOutput": "missing required file: main.py",
        "outcomes": [],
        "timestamp": "2026-01-01T00:00:00Z"
    })
    .to_string();
    let resp = app
        .send_signed("POST", "/api/worker/results", failed.into_bytes(), Some("w1"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let done = submission::Model::find_by_id(app.state.db(), sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, SubmissionStatus::Complete);
}
