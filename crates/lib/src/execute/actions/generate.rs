//! Step source regeneration through the external filter.

use std::path::Path;
use std::process::Stdio;

use tokio::time::Instant;
use tracing::{debug, info};

use super::process::run_process;
use super::{CommandLine, discard, process_error};
use crate::consts::{PH_MARKER, PH_SELF, PH_STEP, PH_TEMPLATE};
use crate::execute::types::ExecuteError;
use crate::rules::StepIndex;
use crate::util::fs::tmp_path_for;

/// Expand the configured filter command line for one step.
pub fn filter_command(
  filter: &[String],
  step: StepIndex,
  template: &Path,
  marker: &str,
  self_exe: Option<&Path>,
) -> Result<CommandLine, ExecuteError> {
  let step = step.to_string();
  let template = template.to_string_lossy();

  let mut words = Vec::with_capacity(filter.len());
  for word in filter {
    let mut word = word.replace(PH_STEP, &step).replace(PH_TEMPLATE, &template).replace(PH_MARKER, marker);
    if word.contains(PH_SELF) {
      let exe = self_exe.ok_or(ExecuteError::SelfExeUnavailable)?;
      word = word.replace(PH_SELF, &exe.to_string_lossy());
    }
    words.push(word);
  }

  let mut words = words.into_iter();
  let program = words.next().unwrap_or_default();
  Ok(CommandLine::new(program).args(words))
}

/// Run the filter for `step`, writing its stdout to `dest`.
///
/// Output goes to a temporary sibling of `dest` first. The temporary file is
/// promoted only when the filter exits 0 with non-empty output; otherwise it is
/// removed and `dest` is left as it was.
pub async fn generate(
  step: StepIndex,
  command: &CommandLine,
  dest: &Path,
  cwd: &Path,
  deadline: Option<Instant>,
) -> Result<std::path::PathBuf, ExecuteError> {
  info!(step = %step, dest = %dest.display(), "regenerating step source");

  let tmp = tmp_path_for(dest);
  let file = tokio::fs::File::create(&tmp).await?.into_std().await;

  let finished = match run_process(command, cwd, Stdio::from(file), deadline).await {
    Ok(finished) => finished,
    Err(e) => {
      discard(&tmp).await;
      return Err(process_error(step, command, e));
    }
  };

  if !finished.success {
    discard(&tmp).await;
    return Err(ExecuteError::GenerationFailed {
      step,
      command: command.to_string(),
      code: finished.code,
      stderr: finished.stderr,
    });
  }

  if tokio::fs::metadata(&tmp).await?.len() == 0 {
    discard(&tmp).await;
    return Err(ExecuteError::EmptyOutput {
      step,
      command: command.to_string(),
    });
  }

  if let Err(e) = tokio::fs::rename(&tmp, dest).await {
    discard(&tmp).await;
    return Err(e.into());
  }
  debug!(step = %step, dest = %dest.display(), "step source promoted");

  Ok(dest.to_path_buf())
}
