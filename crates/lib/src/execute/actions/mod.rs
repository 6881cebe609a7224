//! External process actions.
//!
//! Every task ends up as one external process: the filter for a regeneration,
//! the compiler for a compilation. A [`Job`] holds everything a task needs as
//! owned data so it can run on its own tokio task.

pub mod compile;
pub mod generate;
pub mod process;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Instant;
use tracing::warn;

use crate::config::CompilerSettings;
use crate::execute::types::{ExecuteError, Task};
use crate::rules::StepIndex;

pub use compile::{compile, compile_command};
pub use generate::{filter_command, generate};
pub use process::{Finished, ProcessError, run_process};

/// A program and its arguments, spawned directly without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
  pub program: String,
  pub args: Vec<String>,
}

impl CommandLine {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }
}

/// Renders the command the way a user would type it in a POSIX shell.
impl fmt::Display for CommandLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", quote(&self.program))?;
    for arg in &self.args {
      write!(f, " {}", quote(arg))?;
    }
    Ok(())
  }
}

fn quote(word: &str) -> String {
  let plain = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%{}".contains(c));
  if plain {
    word.to_string()
  } else {
    format!("'{}'", word.replace('\'', r"'\''"))
  }
}

/// A fully prepared task.
#[derive(Debug, Clone)]
pub enum Job {
  Generate {
    step: StepIndex,
    command: CommandLine,
    dest: PathBuf,
    cwd: PathBuf,
  },
  Compile {
    step: StepIndex,
    settings: Arc<CompilerSettings>,
    source: PathBuf,
    executable: PathBuf,
    cwd: PathBuf,
  },
}

impl Job {
  pub fn task(&self) -> Task {
    match self {
      Job::Generate { step, .. } => Task::Regenerate(*step),
      Job::Compile { step, .. } => Task::Compile(*step),
    }
  }

  /// Run the job, returning the path of the promoted output.
  pub async fn run(self, deadline: Option<Instant>) -> Result<PathBuf, ExecuteError> {
    match self {
      Job::Generate {
        step,
        command,
        dest,
        cwd,
      } => generate(step, &command, &dest, &cwd, deadline).await,
      Job::Compile {
        step,
        settings,
        source,
        executable,
        cwd,
      } => compile(step, &settings, &source, &executable, &cwd, deadline).await,
    }
  }
}

fn process_error(step: StepIndex, command: &CommandLine, err: ProcessError) -> ExecuteError {
  match err {
    ProcessError::Spawn(source) => ExecuteError::Spawn {
      step,
      command: command.to_string(),
      source,
    },
    ProcessError::Wait(source) => ExecuteError::Io(source),
    ProcessError::TimedOut => ExecuteError::TimedOut {
      step,
      command: command.to_string(),
    },
  }
}

/// Remove a temporary output, logging rather than failing.
async fn discard(tmp: &Path) {
  if let Err(e) = tokio::fs::remove_file(tmp).await
    && e.kind() != std::io::ErrorKind::NotFound
  {
    warn!(path = %tmp.display(), error = %e, "failed to remove temporary output");
  }
}
