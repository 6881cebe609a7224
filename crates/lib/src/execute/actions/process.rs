//! External process execution with an optional deadline.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use super::CommandLine;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to start: {0}")]
  Spawn(#[source] std::io::Error),

  #[error("failed while waiting: {0}")]
  Wait(#[source] std::io::Error),

  #[error("deadline reached")]
  TimedOut,
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct Finished {
  pub code: Option<i32>,
  pub success: bool,
  /// Captured stdout; empty when stdout was redirected elsewhere.
  pub stdout: String,
  pub stderr: String,
}

/// Spawn `command` in `cwd` and wait for it.
///
/// stdin is closed and stderr is captured. `stdout` decides where standard
/// output goes: pass `Stdio::piped()` to capture it or a file to redirect it.
/// The child is killed if the deadline passes before it exits.
pub async fn run_process(
  command: &CommandLine,
  cwd: &Path,
  stdout: Stdio,
  deadline: Option<Instant>,
) -> Result<Finished, ProcessError> {
  debug!(cmd = %command, cwd = %cwd.display(), "spawning process");

  let child = Command::new(&command.program)
    .args(&command.args)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stdout(stdout)
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(ProcessError::Spawn)?;

  let wait = child.wait_with_output();
  let output = match deadline {
    Some(deadline) => tokio::time::timeout_at(deadline, wait)
      .await
      .map_err(|_| ProcessError::TimedOut)?,
    None => wait.await,
  }
  .map_err(ProcessError::Wait)?;

  let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
  let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "process stderr");
  }
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "process stdout");
  }

  Ok(Finished {
    code: output.status.code(),
    success: output.status.success(),
    stdout,
    stderr,
  })
}
