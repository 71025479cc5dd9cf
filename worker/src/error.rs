use code_runner::{ArchiveError, RunnerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected worker credentials")]
    Unauthorized,
    #[error("unexpected response {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("failed to decode server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("test bundle could not be unpacked: {0}")]
    Bundle(ArchiveError),
    #[error("script {0} is not in the test bundle")]
    MissingScript(String),
    #[error("suite {suite} produced no result payload (exit code {exit_code}): {stderr}")]
    NoPayload {
        suite: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("suites reported no test outcomes")]
    NoOutcomes,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
