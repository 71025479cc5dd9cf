//! Runs grading scripts as child processes and unpacks the archives they run against.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use zip::ZipArchive;

/// Exit code reported when a script is killed for exceeding its time limit.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How long to wait for the output pipes to close once the script itself has exited.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("working directory {0} does not exist")]
    MissingWorkingDir(PathBuf),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive expands beyond {0} bytes")]
    TooLarge(u64),
    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),
}

/// What a finished (or killed) script produced. The two streams are captured separately.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs `program args..` in `working_dir`, killing its whole process group once
/// `time_limit` has elapsed.
///
/// A timed-out run reports [`TIMEOUT_EXIT_CODE`] and `timed_out = true` together with
/// whatever output was captured before the kill.
pub async fn run_script(
    program: &str,
    args: &[String],
    working_dir: &Path,
    time_limit: Duration,
) -> Result<ScriptOutput, RunnerError> {
    if !working_dir.is_dir() {
        return Err(RunnerError::MissingWorkingDir(working_dir.to_path_buf()));
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
        program: program.to_string(),
        source,
    })?;
    tracing::debug!(program, pid = ?child.id(), limit_secs = time_limit.as_secs_f64(), "Script started");

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let waited = timeout(time_limit, child.wait()).await;
    let (exit_code, timed_out) = match waited {
        Ok(status) => {
            let status = status.map_err(|source| RunnerError::Wait {
                program: program.to_string(),
                source,
            })?;
            (exit_code_of(status), false)
        }
        Err(_) => {
            kill_group(&mut child);
            if let Err(e) = child.wait().await {
                tracing::warn!(program, error = %e, "Failed to reap timed-out script");
            }
            (TIMEOUT_EXIT_CODE, true)
        }
    };
    let elapsed = started.elapsed();

    let stdout = collect_within(stdout, PIPE_DRAIN_GRACE).await;
    let stderr = collect_within(stderr, PIPE_DRAIN_GRACE).await;

    if timed_out {
        tracing::warn!(program, elapsed_ms = elapsed.as_millis() as u64, "Script timed out and was killed");
    } else {
        tracing::debug!(program, exit_code, elapsed_ms = elapsed.as_millis() as u64, "Script exited");
    }

    Ok(ScriptOutput {
        exit_code,
        stdout,
        stderr,
        timed_out,
        elapsed,
    })
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                tracing::debug!(error = %e, "Output pipe closed with error");
            }
        }
        buf
    })
}

// A descendant that escaped the group can hold the pipe open; give up after `grace`.
async fn collect_within(handle: JoinHandle<Vec<u8>>, grace: Duration) -> Vec<u8> {
    match timeout(grace, handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        // The child was spawned with process_group(0), so its pid is the group id.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            tracing::warn!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Child already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Child already gone");
    }
}

/// Extracts a zip archive into `output_dir`, rejecting entries that would escape it
/// and archives whose declared uncompressed size exceeds `max_total_uncompressed`.
///
/// Returns the relative paths of the files written.
pub fn extract_zip_contents(
    zip_bytes: &[u8],
    max_total_uncompressed: u64,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut total_uncompressed: u64 = 0;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        total_uncompressed = total_uncompressed.saturating_add(file.size());
        if total_uncompressed > max_total_uncompressed {
            return Err(ArchiveError::TooLarge(max_total_uncompressed));
        }

        let raw_name = file.name().to_string();
        if raw_name.contains('\\') {
            return Err(ArchiveError::UnsafePath(raw_name));
        }
        let Some(relative) = file.enclosed_name() else {
            return Err(ArchiveError::UnsafePath(raw_name));
        };

        let outpath = output_dir.join(&relative);
        if file.is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = std::fs::File::create(&outpath)?;
        std::io::copy(&mut file, &mut outfile)?;
        written.push(relative);
    }

    Ok(written)
}
