//! Types for step task execution.
//!
//! This module defines the task identifiers, error types, result types, and
//! configuration for running regeneration and compilation tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::rules::StepIndex;

/// One unit of work in a step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Task {
  /// Produce the step source from the template.
  Regenerate(StepIndex),
  /// Produce the step executable from the step source and support files.
  Compile(StepIndex),
}

impl Task {
  pub fn step(self) -> StepIndex {
    match self {
      Task::Regenerate(step) | Task::Compile(step) => step,
    }
  }
}

impl fmt::Display for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Task::Regenerate(step) => write!(f, "regenerate:{}", step),
      Task::Compile(step) => write!(f, "compile:{}", step),
    }
  }
}

/// Errors that can occur while running step tasks.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The filter exited non-zero.
  #[error("step {step}: filter failed with exit code {code:?}: {command}\n{stderr}")]
  GenerationFailed {
    step: StepIndex,
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The filter succeeded but wrote nothing.
  #[error("step {step}: filter produced no output: {command}")]
  EmptyOutput { step: StepIndex, command: String },

  /// The compiler exited non-zero.
  #[error("step {step}: compiler failed with exit code {code:?}: {command}\n{stderr}")]
  CompilationFailed {
    step: StepIndex,
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The compiler succeeded but did not write its output.
  #[error("step {step}: compiler did not produce {path}: {command}")]
  MissingOutput {
    step: StepIndex,
    command: String,
    path: PathBuf,
  },

  /// The run's time budget expired while the process was running.
  #[error("step {step}: timed out, killed: {command}")]
  TimedOut { step: StepIndex, command: String },

  /// The process could not be started.
  #[error("step {step}: failed to start {command}: {source}")]
  Spawn {
    step: StepIndex,
    command: String,
    #[source]
    source: std::io::Error,
  },

  /// The task died without reporting a result.
  #[error("step {step}: task panicked")]
  Panicked { step: StepIndex },

  /// `{self}` was used in the filter command but the running executable is unknown.
  #[error("cannot resolve {{self}} in the filter command: current executable unknown")]
  SelfExeUnavailable,

  /// I/O error while preparing or promoting outputs.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Cycle detected in the file dependency graph.
  #[error("dependency cycle detected at {0}")]
  CycleDetected(PathBuf),
}

impl ExecuteError {
  /// Exit code of the external process that caused this error, if any.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      ExecuteError::GenerationFailed { code, .. } | ExecuteError::CompilationFailed { code, .. } => *code,
      _ => None,
    }
  }

  /// Step this error belongs to, if any.
  pub fn step(&self) -> Option<StepIndex> {
    match self {
      ExecuteError::GenerationFailed { step, .. }
      | ExecuteError::EmptyOutput { step, .. }
      | ExecuteError::CompilationFailed { step, .. }
      | ExecuteError::MissingOutput { step, .. }
      | ExecuteError::TimedOut { step, .. }
      | ExecuteError::Spawn { step, .. }
      | ExecuteError::Panicked { step } => Some(*step),
      _ => None,
    }
  }
}

/// Result of running a set of goals.
#[derive(Debug, Default)]
pub struct RunResult {
  /// Step sources written by the filter.
  pub regenerated: BTreeMap<StepIndex, PathBuf>,

  /// Executables written by the compiler.
  pub compiled: BTreeMap<StepIndex, PathBuf>,

  /// Goal tasks whose outputs were already fresh.
  pub up_to_date: BTreeSet<Task>,

  /// Failed tasks, in the order the failures were observed.
  pub failed: Vec<(Task, ExecuteError)>,

  /// Tasks skipped because a task they depend on failed.
  /// Maps skipped task -> the failed dependency.
  pub skipped: BTreeMap<Task, Task>,
}

impl RunResult {
  /// Returns true if no task failed or was skipped.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// Total number of tasks that ran (successfully or not).
  pub fn ran(&self) -> usize {
    self.regenerated.len() + self.compiled.len() + self.failed.len()
  }

  /// Process exit code for this run: 0 on success, otherwise the exit code of
  /// the first failing external process, or 1 when it had none.
  pub fn exit_code(&self) -> i32 {
    match self.failed.first() {
      None if self.skipped.is_empty() => 0,
      None => 1,
      Some((_, err)) => err.exit_code().filter(|c| *c != 0).unwrap_or(1),
    }
  }
}

/// Configuration for task execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of external processes running at once.
  pub parallelism: usize,

  /// Time budget for the whole run. Processes still running at the deadline are killed.
  pub timeout: Option<Duration>,

  /// Path substituted for `{self}` in the filter command.
  pub self_exe: Option<PathBuf>,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      timeout: None,
      self_exe: std::env::current_exe().ok(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
