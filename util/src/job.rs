use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};

/// Payload handed to a worker after a successful claim.
///
/// Never persisted; rebuilt from the submission and its test setup on every claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "submissionID")]
    pub submission_id: i64,
    #[serde(rename = "testSetupID")]
    pub test_setup_id: i64,
    #[serde(rename = "attemptNumber")]
    pub attempt_number: i64,
    #[serde(rename = "submissionURL")]
    pub submission_url: String,
    #[serde(rename = "testSetupURL")]
    pub test_setup_url: String,
    pub manifest: Manifest,
    #[serde(
        rename = "submissionFilename",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub submission_filename: Option<String>,
}

/// Body of the worker claim request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    #[serde(rename = "workerID")]
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Body returned once a result has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultReceipt {
    pub received: bool,
}
