//! Worker-facing half of the submission lifecycle: claiming jobs, ingesting results
//! and serving the artifacts a job points at.

use super::blobs;
use super::job_builder::{JobBuildError, build_job};
use axum::http::StatusCode;
use chrono::Utc;
use db::models::submission::{self, SubmissionStatus};
use db::models::{test_outcome_collection, test_setup};
use sea_orm::{DbErr, TransactionTrait};
use std::path::Path;
use thiserror::Error;
use util::job::Job;
use util::notebook::{NotebookError, merge_for_grading};
use util::state::AppState;
use util::storage::StorageError;
use util::test_outcome::{OutcomeError, TestOutcomeCollection};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error(transparent)]
    JobBuild(#[from] JobBuildError),
    #[error("invalid result: {0}")]
    InvalidResult(#[from] OutcomeError),
    #[error("{0} {1} not found")]
    NotFound(&'static str, i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
}

impl DispatchError {
    /// Status code the HTTP layer answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::InvalidResult(_) | DispatchError::Notebook(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DispatchError::NotFound(..) | DispatchError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            DispatchError::Db(_) | DispatchError::JobBuild(_) | DispatchError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller. Internal failures are reduced to a generic
    /// string; validation failures are returned verbatim.
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Claims the oldest pending submission for `worker_id` and builds its job.
///
/// A job that cannot be built leaves the submission `assigned`; the error is returned to
/// this caller only.
pub async fn claim_job(
    app_state: &AppState,
    worker_id: &str,
    hostname: Option<&str>,
) -> Result<Option<Job>, DispatchError> {
    let db = app_state.db();
    let Some(claimed) = submission::Model::claim_next(db, worker_id, hostname, Utc::now()).await?
    else {
        return Ok(None);
    };

    let setup = test_setup::Model::find_by_id(db, claimed.test_setup_id).await?;
    let job = build_job(&claimed, setup.as_ref(), app_state.public_base_url()).inspect_err(|e| {
        tracing::error!(
            submission_id = claimed.id,
            worker_id,
            error = %e,
            "Claimed submission but could not build its job"
        );
    })?;

    tracing::info!(
        submission_id = job.submission_id,
        test_setup_id = job.test_setup_id,
        attempt = job.attempt_number,
        worker_id,
        "Job dispatched"
    );
    Ok(Some(job))
}

/// What happened to a posted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    /// `false` when an identical report had already been stored.
    pub stored: bool,
    /// `true` when the submission moved from `assigned` to `complete`.
    pub completed: bool,
}

/// Validates and persists a worker's result, then completes the submission.
///
/// Results for unknown or still pending submissions are kept as orphaned rows and do not
/// count as the submission's result. A failed build is a normal terminal result and still
/// completes the submission.
pub async fn ingest_result(app_state: &AppState, raw: &[u8]) -> Result<Ingested, DispatchError> {
    let collection = TestOutcomeCollection::parse(raw)?;
    let now = Utc::now();

    let txn = app_state.db().begin().await?;
    let existing = submission::Model::find_by_id(&txn, collection.submission_id).await?;
    let orphaned = existing
        .as_ref()
        .is_none_or(|sub| sub.status == SubmissionStatus::Pending);
    let stored =
        test_outcome_collection::Model::record(&txn, &collection, false, orphaned, now).await?;
    let completed = match &existing {
        Some(sub) if sub.status == SubmissionStatus::Assigned => {
            submission::Model::mark_complete(&txn, sub.id, now).await?
        }
        _ => false,
    };
    txn.commit().await?;

    match existing {
        None => tracing::warn!(
            submission_id = collection.submission_id,
            "Result received for unknown submission; stored as orphaned"
        ),
        Some(sub) if !completed => tracing::info!(
            submission_id = sub.id,
            status = %sub.status,
            stored,
            orphaned,
            "Result received for submission that is not assigned; status unchanged"
        ),
        Some(sub) => tracing::info!(
            submission_id = sub.id,
            build_status = collection.build_status.as_str(),
            passed = collection.counts.passed,
            total = collection.counts.total,
            "Submission complete"
        ),
    }

    Ok(Ingested { stored, completed })
}

fn is_notebook(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ipynb"))
}

/// Bytes a worker receives for a submission.
///
/// A notebook submission whose test setup has a canonical notebook is served merged:
/// the student's own cells followed by every instructor test cell.
pub async fn submission_artifact(
    app_state: &AppState,
    submission_id: i64,
) -> Result<Vec<u8>, DispatchError> {
    let db = app_state.db();
    let sub = submission::Model::find_by_id(db, submission_id)
        .await?
        .ok_or(DispatchError::NotFound("submission", submission_id))?;
    let raw = blobs::read(app_state, &sub.path).await?;

    if !is_notebook(&sub.path) {
        return Ok(raw);
    }
    let instructor_key = test_setup::Model::find_by_id(db, sub.test_setup_id)
        .await?
        .and_then(|setup| setup.notebook_path);
    match instructor_key {
        Some(key) => {
            let instructor = blobs::read(app_state, &key).await?;
            let merged = merge_for_grading(&raw, &instructor).inspect_err(|e| {
                tracing::warn!(submission_id, error = %e, "Refusing to serve unmergeable notebook");
            })?;
            Ok(merged)
        }
        None => Ok(raw),
    }
}

/// Bytes of a test setup's bundle archive.
pub async fn test_setup_artifact(
    app_state: &AppState,
    test_setup_id: i64,
) -> Result<Vec<u8>, DispatchError> {
    let setup = test_setup::Model::find_by_id(app_state.db(), test_setup_id)
        .await?
        .ok_or(DispatchError::NotFound("test setup", test_setup_id))?;
    Ok(blobs::read(app_state, &setup.path).await?)
}
