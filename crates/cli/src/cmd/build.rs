//! Build-like targets: `all`, `regenerate-all`, `sN`, `ssN` and step names.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use stepmake_lib::execute::{ExecuteConfig, RunResult, Task, run};
use stepmake_lib::project::Project;
use stepmake_lib::rules::{StepIndex, Target};

use super::RunOptions;
use crate::output::{
  format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning, symbols,
};

#[derive(Debug, Serialize)]
struct Failure {
  task: Task,
  code: Option<i32>,
  message: String,
}

#[derive(Debug, Serialize)]
struct Skipped {
  task: Task,
  failed_dependency: Task,
}

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
  regenerated: &'a BTreeMap<StepIndex, PathBuf>,
  compiled: &'a BTreeMap<StepIndex, PathBuf>,
  up_to_date: Vec<Task>,
  failed: Vec<Failure>,
  skipped: Vec<Skipped>,
  exit_code: i32,
}

impl<'a> BuildSummary<'a> {
  fn new(result: &'a RunResult) -> Self {
    Self {
      regenerated: &result.regenerated,
      compiled: &result.compiled,
      up_to_date: result.up_to_date.iter().copied().collect(),
      failed: result
        .failed
        .iter()
        .map(|(task, err)| Failure {
          task: *task,
          code: err.exit_code(),
          message: err.to_string(),
        })
        .collect(),
      skipped: result
        .skipped
        .iter()
        .map(|(task, dep)| Skipped {
          task: *task,
          failed_dependency: *dep,
        })
        .collect(),
      exit_code: result.exit_code(),
    }
  }
}

/// Bring `targets` up to date. Returns the process exit code for the run.
pub fn cmd_build(project: &Project, targets: &[Target], options: &RunOptions) -> Result<i32> {
  let start = Instant::now();
  let goals = project.goals(targets)?;

  let mut config = ExecuteConfig {
    timeout: options.timeout,
    self_exe: std::env::current_exe().ok().map(|p| dunce::canonicalize(&p).unwrap_or(p)),
    ..Default::default()
  };
  if let Some(jobs) = options.jobs {
    config.parallelism = jobs.max(1);
  }
  debug!(goals = goals.len(), parallelism = config.parallelism, "running goals");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(run(project, &goals, &config)).context("Build failed")?;

  if options.output.is_json() {
    print_json(&BuildSummary::new(&result))?;
    return Ok(result.exit_code());
  }

  for (step, path) in &result.regenerated {
    print_success(&format!("Regenerated step {} {} {}", step, symbols::ARROW, path.display()));
  }
  for (step, path) in &result.compiled {
    print_success(&format!("Built step {} {} {}", step, symbols::ARROW, path.display()));
  }
  for (task, dep) in &result.skipped {
    print_warning(&format!("skipped {}: {} failed", task, dep));
  }
  for (task, err) in &result.failed {
    match err.step() {
      Some(_) => print_error(&err.to_string()),
      None => print_error(&format!("{}: {}", task, err)),
    }
  }

  if result.ran() == 0 && result.is_success() {
    print_info("Nothing to do, all targets up to date");
    return Ok(0);
  }

  println!();
  print_stat("Regenerated", &result.regenerated.len().to_string());
  print_stat("Compiled", &result.compiled.len().to_string());
  print_stat("Up to date", &result.up_to_date.len().to_string());
  if !result.is_success() {
    print_stat("Failed", &result.failed.len().to_string());
    print_stat("Skipped", &result.skipped.len().to_string());
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(result.exit_code())
}
