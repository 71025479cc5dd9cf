//! Pull-based grading worker: claims jobs from the dispatch server, grades them in
//! a scratch directory and reports the results.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod grader;
pub mod shutdown;

use backoff::Backoff;
use client::DispatchClient;
use config::WorkerConfig;
use error::WorkerError;
use grader::Grader;
use tokio_util::sync::CancellationToken;
use util::job::Job;

pub struct Worker {
    client: DispatchClient,
    grader: Grader,
    backoff: Backoff,
}

impl Worker {
    pub fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let client = DispatchClient::new(
            &config.server_url,
            &config.worker_id,
            config.hostname.clone(),
            &config.shared_secret,
            config.http_timeout,
        )?;
        Ok(Self {
            client,
            grader: Grader {
                python: config.python.clone(),
                shell: config.shell.clone(),
                work_dir: config.work_dir.clone(),
                max_archive_bytes: config.max_archive_bytes,
            },
            backoff: Backoff::new(config.backoff_initial, config.backoff_max),
        })
    }

    /// Claims and processes at most one job. Returns the graded submission id.
    ///
    /// A job that hits an infrastructure error is not reported; the error is returned
    /// and the submission stays `assigned` on the server.
    pub async fn poll_once(&mut self) -> Result<Option<i64>, WorkerError> {
        let Some(job) = self.client.claim().await? else {
            return Ok(None);
        };
        self.backoff.reset();

        tracing::info!(
            submission_id = job.submission_id,
            test_setup_id = job.test_setup_id,
            attempt = job.attempt_number,
            "Claimed job"
        );
        self.process(&job).await.inspect_err(|e| {
            tracing::error!(
                submission_id = job.submission_id,
                error = %e,
                "Job abandoned without a report"
            );
        })?;
        Ok(Some(job.submission_id))
    }

    async fn process(&self, job: &Job) -> Result<(), WorkerError> {
        let submission = self.client.download(&job.submission_url).await?;
        let bundle = self.client.download(&job.test_setup_url).await?;

        let collection = self.grader.grade(job, &submission, &bundle).await?;
        let receipt = self.client.submit_result(&collection).await?;
        tracing::info!(
            submission_id = job.submission_id,
            build_status = collection.build_status.as_str(),
            received = receipt.received,
            "Result reported"
        );
        Ok(())
    }

    /// Polls until `shutdown` is cancelled, backing off while the queue is empty.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(worker_id = self.client.worker_id(), "Worker started");

        while !shutdown.is_cancelled() {
            match self.poll_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(WorkerError::Unauthorized) => {
                    tracing::warn!("Server rejected this worker's signature; check WORKER_SHARED_SECRET");
                }
                Err(e) => tracing::warn!(error = %e, "Poll failed"),
            }

            let delay = self.backoff.next();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Worker stopped");
    }
}
