//! Web-facing intake: test-setup uploads, submissions, browser previews and the
//! student notebook view.

use super::blobs;
use axum::http::StatusCode;
use chrono::Utc;
use db::models::submission::{self, NewSubmission};
use db::models::{test_outcome_collection, test_setup};
use sea_orm::{DbErr, TransactionTrait};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;
use util::manifest::{GradingMode, Manifest, ManifestError};
use util::notebook::{Notebook, NotebookError, filter_for_viewer};
use util::paths;
use util::state::AppState;
use util::storage::StorageError;
use util::test_outcome::{OutcomeError, TestOutcomeCollection};
use util::tier::Tier;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Outcome(#[from] OutcomeError),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error("test setup {0} is not graded in the browser")]
    NotBrowserGraded(i64),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0} {1} not found")]
    NotFound(&'static str, i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            IntakeError::Manifest(_)
            | IntakeError::Outcome(_)
            | IntakeError::Notebook(_)
            | IntakeError::NotBrowserGraded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IntakeError::NotFound(..) | IntakeError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            IntakeError::Storage(_) | IntakeError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Final path component of the client-supplied name, or `fallback`.
    pub fn stored_name(&self, fallback: &str) -> String {
        self.filename
            .as_deref()
            .and_then(|n| Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

fn key_string(key: std::path::PathBuf) -> String {
    key.to_string_lossy().replace('\\', "/")
}

/// Validates the manifest and stores a new test setup with its bundle and optional
/// canonical notebook.
pub async fn create_test_setup(
    app_state: &AppState,
    name: &str,
    manifest_raw: &str,
    bundle: &Upload,
    notebook: Option<&Upload>,
) -> Result<test_setup::Model, IntakeError> {
    let manifest = Manifest::parse_for_upload(manifest_raw)?;
    if bundle.bytes.is_empty() {
        return Err(IntakeError::BadRequest("bundle is empty"));
    }
    if let Some(nb) = notebook {
        Notebook::parse(&nb.bytes, "instructor")?;
    }

    let txn = app_state.db().begin().await?;
    let mut setup = test_setup::Model::create(&txn, name, &manifest).await?;
    blobs::write(app_state, &setup.path, bundle.bytes.clone()).await?;

    if let Some(nb) = notebook {
        let key = key_string(paths::test_setup_notebook_key(setup.id));
        blobs::write(app_state, &key, nb.bytes.clone()).await?;
        setup = test_setup::Model::set_notebook_path(&txn, setup.id, &key).await?;
    }
    txn.commit().await?;

    tracing::info!(
        test_setup_id = setup.id,
        suites = manifest.test_suites.len(),
        has_notebook = setup.notebook_path.is_some(),
        "Test setup created"
    );
    Ok(setup)
}

async fn require_setup(
    app_state: &AppState,
    test_setup_id: i64,
) -> Result<test_setup::Model, IntakeError> {
    test_setup::Model::find_by_id(app_state.db(), test_setup_id)
        .await?
        .ok_or(IntakeError::NotFound("test setup", test_setup_id))
}

fn new_submission(test_setup_id: i64, user_id: Option<i64>, file: &Upload) -> NewSubmission {
    NewSubmission {
        test_setup_id,
        user_id,
        filename: file.filename.clone(),
        file_hash: file.sha256(),
    }
}

/// Stores the artifact and queues a `pending` submission for worker grading.
pub async fn submit(
    app_state: &AppState,
    test_setup_id: i64,
    user_id: Option<i64>,
    file: &Upload,
) -> Result<submission::Model, IntakeError> {
    if file.bytes.is_empty() {
        return Err(IntakeError::BadRequest("file is empty"));
    }
    require_setup(app_state, test_setup_id).await?;
    let stored_name = file.stored_name("submission");

    let txn = app_state.db().begin().await?;
    let sub = submission::Model::enqueue(
        &txn,
        new_submission(test_setup_id, user_id, file),
        |attempt| key_string(paths::submission_key(test_setup_id, user_id, attempt, &stored_name)),
    )
    .await?;
    blobs::write(app_state, &sub.path, file.bytes.clone()).await?;
    txn.commit().await?;

    tracing::info!(
        submission_id = sub.id,
        test_setup_id,
        attempt = sub.attempt_number,
        "Submission queued"
    );
    Ok(sub)
}

/// Records a browser-graded preview and queues its authoritative re-run.
///
/// Creates, in one transaction, the `browser-complete` record, its preview collection
/// (`is_preview = true`) and the linked `pending` re-run. Returns `(preview, rerun)`.
pub async fn record_browser_preview(
    app_state: &AppState,
    test_setup_id: i64,
    user_id: Option<i64>,
    file: &Upload,
    results_raw: &[u8],
) -> Result<(submission::Model, submission::Model), IntakeError> {
    if file.bytes.is_empty() {
        return Err(IntakeError::BadRequest("file is empty"));
    }
    let setup = require_setup(app_state, test_setup_id).await?;
    if setup.decoded_manifest()?.grading_mode != GradingMode::Browser {
        return Err(IntakeError::NotBrowserGraded(test_setup_id));
    }
    let mut collection = TestOutcomeCollection::parse(results_raw)?;
    let stored_name = file.stored_name("submission");

    let txn = app_state.db().begin().await?;
    let (preview, rerun) = submission::Model::create_browser_preview(
        &txn,
        new_submission(test_setup_id, user_id, file),
        |attempt| key_string(paths::submission_key(test_setup_id, user_id, attempt, &stored_name)),
    )
    .await?;

    // The browser cannot know the ids the server assigns.
    collection.submission_id = preview.id;
    collection.test_setup_id = test_setup_id;
    collection.attempt_number = preview.attempt_number;
    test_outcome_collection::Model::record(&txn, &collection, true, false, Utc::now()).await?;

    blobs::write(app_state, &preview.path, file.bytes.clone()).await?;
    txn.commit().await?;

    tracing::info!(
        preview_id = preview.id,
        rerun_id = rerun.id,
        test_setup_id,
        "Browser preview recorded; re-run queued"
    );
    Ok((preview, rerun))
}

/// The canonical notebook with secret and release test cells removed.
pub async fn student_notebook(
    app_state: &AppState,
    test_setup_id: i64,
) -> Result<Vec<u8>, IntakeError> {
    let setup = require_setup(app_state, test_setup_id).await?;
    let key = setup
        .notebook_path
        .ok_or(IntakeError::NotFound("notebook for test setup", test_setup_id))?;
    let raw = blobs::read(app_state, &key).await?;
    Ok(filter_for_viewer(&raw, &Tier::HIDDEN_FROM_STUDENTS)?)
}

/// A submission together with every collection stored for it.
#[derive(Debug, serde::Serialize)]
pub struct SubmissionView {
    pub submission: submission::Model,
    pub results: Vec<ResultView>,
}

#[derive(Debug, serde::Serialize)]
pub struct ResultView {
    pub is_preview: bool,
    pub received_at: chrono::DateTime<Utc>,
    pub collection: TestOutcomeCollection,
}

pub async fn submission_view(
    app_state: &AppState,
    submission_id: i64,
) -> Result<SubmissionView, IntakeError> {
    let db = app_state.db();
    let submission = submission::Model::find_by_id(db, submission_id)
        .await?
        .ok_or(IntakeError::NotFound("submission", submission_id))?;

    let mut results = Vec::new();
    for row in test_outcome_collection::Model::find_by_submission(db, submission_id).await? {
        results.push(ResultView {
            is_preview: row.is_preview,
            received_at: row.received_at,
            collection: row.collection()?,
        });
    }
    Ok(SubmissionView {
        submission,
        results,
    })
}
