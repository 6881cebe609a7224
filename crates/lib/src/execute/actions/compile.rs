//! Step executable compilation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::time::Instant;
use tracing::{debug, info};

use super::process::run_process;
use super::{CommandLine, discard, process_error};
use crate::config::CompilerSettings;
use crate::execute::types::ExecuteError;
use crate::rules::StepIndex;
use crate::util::fs::tmp_path_for;

/// Build the compiler command line.
///
/// Layout: `<program> <flags..> [-isysroot SDK] [OPT] [DEBUG] [-v] -o OUTPUT SOURCE SUPPORT.. [-lLIB..]`
pub fn compile_command(settings: &CompilerSettings, source: &Path, output: &Path) -> CommandLine {
  let mut cmd = CommandLine::new(&settings.program).args(settings.flags.iter().cloned());

  if let Some(sdk) = &settings.sdk_root {
    cmd = cmd.arg("-isysroot").arg(sdk.to_string_lossy());
  }
  if let Some(opt) = &settings.opt_level {
    cmd = cmd.arg(opt);
  }
  if let Some(debug) = &settings.debug {
    cmd = cmd.arg(debug);
  }
  if settings.verbose {
    cmd = cmd.arg("-v");
  }

  cmd = cmd
    .arg("-o")
    .arg(output.to_string_lossy())
    .arg(source.to_string_lossy())
    .args(settings.support.iter().map(|p| p.to_string_lossy().into_owned()));

  cmd.args(settings.libs.iter().map(|lib| format!("-l{}", lib)))
}

/// Compile `source` and the support files into `executable`.
///
/// The compiler writes to a temporary sibling of `executable`, which replaces
/// the executable only on success. On failure the temporary output is deleted
/// and any previous executable is left untouched.
pub async fn compile(
  step: StepIndex,
  settings: &CompilerSettings,
  source: &Path,
  executable: &Path,
  cwd: &Path,
  deadline: Option<Instant>,
) -> Result<PathBuf, ExecuteError> {
  info!(step = %step, source = %source.display(), "compiling step");

  let tmp = tmp_path_for(executable);
  discard(&tmp).await;

  let command = compile_command(settings, source, &tmp);

  let finished = match run_process(&command, cwd, Stdio::piped(), deadline).await {
    Ok(finished) => finished,
    Err(e) => {
      discard(&tmp).await;
      return Err(process_error(step, &command, e));
    }
  };

  if !finished.success {
    discard(&tmp).await;
    return Err(ExecuteError::CompilationFailed {
      step,
      command: command.to_string(),
      code: finished.code,
      stderr: finished.stderr,
    });
  }

  if !tokio::fs::try_exists(&tmp).await? {
    return Err(ExecuteError::MissingOutput {
      step,
      command: command.to_string(),
      path: tmp,
    });
  }

  if let Err(e) = tokio::fs::rename(&tmp, executable).await {
    discard(&tmp).await;
    return Err(e.into());
  }
  debug!(step = %step, executable = %executable.display(), "executable promoted");

  Ok(executable.to_path_buf())
}
