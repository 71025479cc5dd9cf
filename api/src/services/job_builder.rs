use db::models::{submission, test_setup};
use thiserror::Error;
use util::job::Job;
use util::manifest::ManifestError;

#[derive(Debug, Error)]
pub enum JobBuildError {
    #[error("submission {submission_id} references missing test setup {test_setup_id}")]
    MissingTestSetup {
        submission_id: i64,
        test_setup_id: i64,
    },
    #[error("test setup {test_setup_id} has an unusable manifest: {source}")]
    Manifest {
        test_setup_id: i64,
        #[source]
        source: ManifestError,
    },
}

/// URL a worker downloads the submission artifact from.
pub fn submission_artifact_url(base_url: &str, submission_id: i64) -> String {
    format!("{base_url}/api/worker/submissions/{submission_id}/artifact")
}

/// URL a worker downloads the test-setup bundle from.
pub fn test_setup_artifact_url(base_url: &str, test_setup_id: i64) -> String {
    format!("{base_url}/api/worker/test-setups/{test_setup_id}/artifact")
}

/// Assembles the job for a freshly claimed submission.
///
/// `setup` is `None` when the submission's test setup row is gone. The stored manifest
/// is decoded and its schema version checked again even though uploads are validated.
pub fn build_job(
    submission: &submission::Model,
    setup: Option<&test_setup::Model>,
    base_url: &str,
) -> Result<Job, JobBuildError> {
    let setup = setup.ok_or(JobBuildError::MissingTestSetup {
        submission_id: submission.id,
        test_setup_id: submission.test_setup_id,
    })?;

    let manifest = setup
        .decoded_manifest()
        .and_then(|m| m.check_version().map(|_| m))
        .map_err(|source| JobBuildError::Manifest {
            test_setup_id: setup.id,
            source,
        })?;

    Ok(Job {
        submission_id: submission.id,
        test_setup_id: setup.id,
        attempt_number: submission.attempt_number,
        submission_url: submission_artifact_url(base_url, submission.id),
        test_setup_url: test_setup_artifact_url(base_url, setup.id),
        manifest,
        submission_filename: submission.filename.clone(),
    })
}
