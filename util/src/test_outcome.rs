//! Structured grading results reported by workers.

use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OutcomeError {
    #[error("malformed result JSON: {0}")]
    Malformed(String),
    #[error("buildStatus is failed but {0} outcomes were reported")]
    OutcomesOnFailedBuild(usize),
    #[error("buildStatus is {0} but no outcomes were reported")]
    MissingOutcomes(&'static str),
    #[error("attemptNumber must be at least 1")]
    InvalidAttempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Pass,
    Fail,
    Error,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Passed,
    Failed,
    Skipped,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Passed => "passed",
            BuildStatus::Failed => "failed",
            BuildStatus::Skipped => "skipped",
        }
    }
}

/// One test case result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub name: String,
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub tier: Tier,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub short_result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_result: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub attempt_number: i64,
    #[serde(default)]
    pub first_pass: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub passed: u32,
    pub failed: u32,
    pub errored: u32,
    pub timed_out: u32,
    pub total: u32,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[TestOutcome]) -> Self {
        let mut counts = OutcomeCounts::default();
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Pass => counts.passed += 1,
                OutcomeStatus::Fail => counts.failed += 1,
                OutcomeStatus::Error => counts.errored += 1,
                OutcomeStatus::Timeout => counts.timed_out += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

/// A submission's full result, created once by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcomeCollection {
    #[serde(rename = "submissionID")]
    pub submission_id: i64,
    #[serde(rename = "testSetupID")]
    pub test_setup_id: i64,
    pub attempt_number: i64,
    pub build_status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_output: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<TestOutcome>,
    #[serde(default)]
    pub counts: OutcomeCounts,
    #[serde(default)]
    pub wall_time_ms: u64,
    #[serde(default)]
    pub runner_version: String,
    pub timestamp: DateTime<Utc>,
}

impl TestOutcomeCollection {
    /// Builds a collection and derives its counts from the outcomes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        submission_id: i64,
        test_setup_id: i64,
        attempt_number: i64,
        build_status: BuildStatus,
        compiler_output: Option<String>,
        outcomes: Vec<TestOutcome>,
        wall_time_ms: u64,
        runner_version: impl Into<String>,
    ) -> Self {
        let counts = OutcomeCounts::tally(&outcomes);
        Self {
            submission_id,
            test_setup_id,
            attempt_number,
            build_status,
            compiler_output,
            outcomes,
            counts,
            wall_time_ms,
            runner_version: runner_version.into(),
            timestamp: Utc::now(),
        }
    }

    /// Decodes a posted collection and validates it.
    ///
    /// Reported counts are replaced by counts derived from the outcomes, so the
    /// stored aggregates always agree with the stored list.
    pub fn parse(raw: &[u8]) -> Result<Self, OutcomeError> {
        let mut collection: Self =
            serde_json::from_slice(raw).map_err(|e| OutcomeError::Malformed(e.to_string()))?;
        collection.validate()?;
        collection.counts = OutcomeCounts::tally(&collection.outcomes);
        Ok(collection)
    }

    /// Outcomes are empty if and only if the build failed.
    pub fn validate(&self) -> Result<(), OutcomeError> {
        if self.attempt_number < 1 {
            return Err(OutcomeError::InvalidAttempt);
        }
        match (self.build_status, self.outcomes.is_empty()) {
            (BuildStatus::Failed, false) => {
                Err(OutcomeError::OutcomesOnFailedBuild(self.outcomes.len()))
            }
            (BuildStatus::Failed, true) => Ok(()),
            (status, true) => Err(OutcomeError::MissingOutcomes(status.as_str())),
            (_, false) => Ok(()),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.build_status != BuildStatus::Failed && self.counts.passed == self.counts.total
    }
}
