//! Turns a claimed [`Job`] plus its two artifacts into a [`TestOutcomeCollection`].

use crate::error::WorkerError;
use code_runner::{ScriptOutput, extract_zip_contents, run_script};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use util::job::Job;
use util::manifest::{SuiteTarget, TestSuite};
use util::test_outcome::{BuildStatus, OutcomeStatus, TestOutcome, TestOutcomeCollection};
use util::tier::Tier;

pub const RUNNER_VERSION: &str = concat!("worker/", env!("CARGO_PKG_VERSION"));

/// Longest stderr excerpt carried in errors and compiler output.
const STDERR_EXCERPT: usize = 4096;

/// What a suite prints on stdout, as a whole document or as its last JSON line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiteReport {
    #[serde(default)]
    build_status: Option<BuildStatus>,
    #[serde(default)]
    compiler_output: Option<String>,
    #[serde(default)]
    outcomes: Vec<SuiteCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiteCase {
    name: String,
    #[serde(rename = "class", default)]
    class_name: Option<String>,
    #[serde(default)]
    tier: Option<Tier>,
    status: OutcomeStatus,
    #[serde(default)]
    short_result: String,
    #[serde(default)]
    long_result: Option<String>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    memory_kb: Option<u64>,
    #[serde(default)]
    score: Option<f64>,
}

impl SuiteCase {
    fn into_outcome(self, suite_tier: Tier, attempt_number: i64) -> TestOutcome {
        TestOutcome {
            first_pass: attempt_number == 1 && self.status == OutcomeStatus::Pass,
            name: self.name,
            class_name: self.class_name,
            tier: self.tier.unwrap_or(suite_tier),
            status: self.status,
            short_result: self.short_result,
            long_result: self.long_result,
            duration_ms: self.duration_ms,
            memory_kb: self.memory_kb,
            score: self.score,
            attempt_number,
        }
    }
}

fn parse_report(stdout: &[u8]) -> Option<SuiteReport> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if let Ok(report) = serde_json::from_str(trimmed) {
        return Some(report);
    }
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_EXCERPT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// The submission's file name inside the scratch directory.
fn submission_name(job: &Job) -> String {
    job.submission_filename
        .as_deref()
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("submission")
        .to_string()
}

fn is_zip(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

pub struct Grader {
    pub python: String,
    pub shell: String,
    pub work_dir: PathBuf,
    pub max_archive_bytes: u64,
}

impl Grader {
    /// Grades one job in a fresh scratch directory that is removed afterwards.
    ///
    /// Problems with the student's work (missing required files, an archive that
    /// cannot be unpacked, a suite reporting a failed build) become a `failed` build.
    /// Anything else is returned as an error and must not be reported.
    pub async fn grade(
        &self,
        job: &Job,
        submission: &[u8],
        bundle: &[u8],
    ) -> Result<TestOutcomeCollection, WorkerError> {
        let started = Instant::now();
        std::fs::create_dir_all(&self.work_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job.submission_id))
            .tempdir_in(&self.work_dir)?;
        let dir = scratch.path();

        let name = submission_name(job);
        if is_zip(&name) {
            if let Err(e) = extract_zip_contents(submission, self.max_archive_bytes, dir) {
                return Ok(failed_build(
                    job,
                    format!("submission archive could not be unpacked: {e}"),
                    started,
                ));
            }
        } else {
            std::fs::write(dir.join(&name), submission)?;
        }

        let missing: Vec<&str> = job
            .manifest
            .required_files
            .iter()
            .map(String::as_str)
            .filter(|f| !dir.join(f).is_file())
            .collect();
        if !missing.is_empty() {
            tracing::info!(submission_id = job.submission_id, ?missing, "Required files missing");
            return Ok(failed_build(
                job,
                format!("missing required files: {}", missing.join(", ")),
                started,
            ));
        }

        // Bundle files win over anything the student shipped with the same name.
        extract_zip_contents(bundle, self.max_archive_bytes, dir).map_err(WorkerError::Bundle)?;

        let time_limit = Duration::from_secs(job.manifest.limits.time_limit_seconds);
        let mut outcomes = Vec::new();
        for suite in &job.manifest.test_suites {
            let output = self.run_suite(suite, dir, time_limit).await?;
            let label = suite.target.value();

            if output.timed_out {
                tracing::info!(submission_id = job.submission_id, suite = label, "Suite timed out");
                outcomes.push(TestOutcome {
                    name: label.to_string(),
                    class_name: None,
                    tier: suite.tier,
                    status: OutcomeStatus::Timeout,
                    short_result: format!("timed out after {}s", time_limit.as_secs()),
                    long_result: None,
                    duration_ms: output.elapsed.as_millis() as u64,
                    memory_kb: None,
                    score: None,
                    attempt_number: job.attempt_number,
                    first_pass: false,
                });
                continue;
            }

            let Some(report) = parse_report(&output.stdout) else {
                return Err(WorkerError::NoPayload {
                    suite: label.to_string(),
                    exit_code: output.exit_code,
                    stderr: excerpt(&output.stderr),
                });
            };

            if report.build_status == Some(BuildStatus::Failed) {
                let detail = report
                    .compiler_output
                    .unwrap_or_else(|| excerpt(&output.stderr));
                return Ok(failed_build(job, detail, started));
            }
            outcomes.extend(
                report
                    .outcomes
                    .into_iter()
                    .map(|case| case.into_outcome(suite.tier, job.attempt_number)),
            );
        }

        if outcomes.is_empty() {
            return Err(WorkerError::NoOutcomes);
        }

        let collection = TestOutcomeCollection::new(
            job.submission_id,
            job.test_setup_id,
            job.attempt_number,
            BuildStatus::Passed,
            None,
            outcomes,
            elapsed_ms(started),
            RUNNER_VERSION,
        );
        tracing::info!(
            submission_id = job.submission_id,
            passed = collection.counts.passed,
            total = collection.counts.total,
            "Graded"
        );
        Ok(collection)
    }

    async fn run_suite(
        &self,
        suite: &TestSuite,
        dir: &Path,
        time_limit: Duration,
    ) -> Result<ScriptOutput, WorkerError> {
        let (program, args) = match &suite.target {
            SuiteTarget::Script(script) => {
                if !dir.join(script).is_file() {
                    return Err(WorkerError::MissingScript(script.clone()));
                }
                (self.shell.as_str(), vec![script.clone()])
            }
            SuiteTarget::Module(module) => {
                (self.python.as_str(), vec!["-m".to_string(), module.clone()])
            }
        };
        Ok(run_script(program, &args, dir, time_limit).await?)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn failed_build(job: &Job, detail: String, started: Instant) -> TestOutcomeCollection {
    TestOutcomeCollection::new(
        job.submission_id,
        job.test_setup_id,
        job.attempt_number,
        BuildStatus::Failed,
        Some(detail),
        Vec::new(),
        elapsed_ms(started),
        RUNNER_VERSION,
    )
}
