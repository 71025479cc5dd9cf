//! Test-setup manifest: the versioned JSON document describing how a
//! submission is built and tested.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only manifest schema version this server understands.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ManifestError {
    #[error("malformed manifest JSON: {0}")]
    Malformed(String),
    #[error("unsupported manifest schemaVersion {0} (expected {SUPPORTED_SCHEMA_VERSION})")]
    UnsupportedVersion(u32),
    #[error("manifest for worker grading declares no test suites")]
    NoTestSuites,
    #[error("test suite {0} has an empty target")]
    EmptySuiteTarget(usize),
    #[error("limits.{0} must be greater than zero")]
    NonPositiveLimit(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingMode {
    Browser,
    Worker,
}

/// What a suite runs: a script file inside the bundle, or a Python module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteTarget {
    Module(String),
    Script(String),
}

impl SuiteTarget {
    pub fn value(&self) -> &str {
        match self {
            SuiteTarget::Module(v) | SuiteTarget::Script(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestSuite {
    #[serde(default)]
    pub tier: Tier,
    #[serde(flatten)]
    pub target: SuiteTarget,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    #[serde(default = "default_time_limit_seconds")]
    pub time_limit_seconds: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time_limit_seconds: default_time_limit_seconds(),
            memory_limit_mb: default_memory_limit_mb(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOptions {
    #[serde(default)]
    pub allow_partial_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub grading_mode: GradingMode,
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default)]
    pub test_suites: Vec<TestSuite>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub options: ManifestOptions,
}

fn default_time_limit_seconds() -> u64 {
    60
}

fn default_memory_limit_mb() -> u64 {
    512
}

impl Manifest {
    /// Decodes a manifest document without validating it.
    pub fn from_json(raw: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(raw).map_err(|e| ManifestError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // A struct of strings, numbers and enums always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Checks only the schema version. This is the guard the job builder runs.
    pub fn check_version(&self) -> Result<(), ManifestError> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.schema_version));
        }
        Ok(())
    }

    /// Full upload-time validation.
    pub fn validate(&self) -> Result<(), ManifestError> {
        self.check_version()?;

        if self.grading_mode == GradingMode::Worker && self.test_suites.is_empty() {
            return Err(ManifestError::NoTestSuites);
        }
        if let Some(idx) = self
            .test_suites
            .iter()
            .position(|s| s.target.value().trim().is_empty())
        {
            return Err(ManifestError::EmptySuiteTarget(idx));
        }
        if self.limits.time_limit_seconds == 0 {
            return Err(ManifestError::NonPositiveLimit("timeLimitSeconds"));
        }
        if self.limits.memory_limit_mb == 0 {
            return Err(ManifestError::NonPositiveLimit("memoryLimitMb"));
        }
        Ok(())
    }

    /// Trims required-file names, drops blanks and duplicates (first occurrence wins),
    /// and trims suite targets.
    pub fn normalize(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.required_files = self
            .required_files
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.clone()))
            .collect();

        for suite in &mut self.test_suites {
            suite.target = match &suite.target {
                SuiteTarget::Module(m) => SuiteTarget::Module(m.trim().to_string()),
                SuiteTarget::Script(s) => SuiteTarget::Script(s.trim().to_string()),
            };
        }
        self
    }

    /// Decode, validate and normalize in one step. Used at upload time.
    pub fn parse_for_upload(raw: &str) -> Result<Self, ManifestError> {
        let manifest = Self::from_json(raw)?.normalize();
        manifest.validate()?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "schemaVersion": 1,
        "gradingMode": "worker",
        "requiredFiles": [" solution.py", "solution.py", "", "helpers.py"],
        "testSuites": [
            {"tier": "public", "script": "run_public.sh"},
            {"tier": "secret", "module": "tests.hidden"}
        ],
        "limits": {"timeLimitSeconds": 30, "memoryLimitMb": 256},
        "options": {"allowPartialCredit": true}
    }"#;

    #[test]
    fn parses_and_normalizes_sample() {
        let m = Manifest::parse_for_upload(SAMPLE).unwrap();
        assert_eq!(m.required_files, vec!["solution.py", "helpers.py"]);
        assert_eq!(m.test_suites.len(), 2);
        assert_eq!(m.test_suites[1].tier, Tier::Secret);
        assert_eq!(
            m.test_suites[1].target,
            SuiteTarget::Module("tests.hidden".into())
        );
        assert_eq!(m.limits.time_limit_seconds, 30);
        assert!(m.options.allow_partial_credit);
    }

    #[test]
    fn suite_target_serializes_as_flat_key() {
        let m = Manifest::from_json(SAMPLE).unwrap();
        let v: serde_json::Value = serde_json::from_str(&m.to_json()).unwrap();
        assert_eq!(v["testSuites"][0]["script"], "run_public.sh");
        assert_eq!(v["testSuites"][1]["module"], "tests.hidden");
        assert_eq!(v["testSuites"][1]["tier"], "secret");
    }

    #[test]
    fn rejects_other_schema_versions() {
        let raw = SAMPLE.replace("\"schemaVersion\": 1", "\"schemaVersion\": 2");
        assert_eq!(
            Manifest::parse_for_upload(&raw).unwrap_err(),
            ManifestError::UnsupportedVersion(2)
        );
    }

    #[test]
    fn worker_mode_needs_suites() {
        let raw = r#"{"schemaVersion":1,"gradingMode":"worker"}"#;
        assert_eq!(
            Manifest::parse_for_upload(raw).unwrap_err(),
            ManifestError::NoTestSuites
        );

        let browser = r#"{"schemaVersion":1,"gradingMode":"browser"}"#;
        let m = Manifest::parse_for_upload(browser).unwrap();
        assert_eq!(m.limits, Limits::default());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let raw = r#"{"schemaVersion":1,"gradingMode":"browser","limits":{"timeLimitSeconds":0}}"#;
        assert_eq!(
            Manifest::parse_for_upload(raw).unwrap_err(),
            ManifestError::NonPositiveLimit("timeLimitSeconds")
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Manifest::from_json("{not json"),
            Err(ManifestError::Malformed(_))
        ));
    }
}
