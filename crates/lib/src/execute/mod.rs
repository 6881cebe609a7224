//! Step task execution.
//!
//! This module provides the main entry point for bringing goals up to date.
//! It handles:
//! - Staleness checks and ordering via the file dependency graph
//! - Parallel execution of independent tasks, bounded by a semaphore
//! - Failure propagation: a failed regeneration skips that step's compile,
//!   other steps keep going

pub mod actions;
pub mod dag;
pub mod types;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::CompilerSettings;
use crate::project::Project;

use actions::{Job, filter_command};
use dag::FsTimestamps;

pub use dag::{BuildGraph, BuildPlan, Timestamps};
pub use types::{ExecuteConfig, ExecuteError, RunResult, Task};

/// Compute the plan for `goals` against the filesystem without running anything.
pub fn plan(project: &Project, goals: &[Task]) -> Result<BuildPlan, ExecuteError> {
  BuildGraph::from_project(project)?.plan(goals, &FsTimestamps)
}

/// Bring `goals` up to date.
///
/// This is the main entry point for execution. It:
/// 1. Builds the file dependency graph for the project
/// 2. Computes stale tasks and their execution waves
/// 3. Executes waves in order, with parallelism within each wave
/// 4. Records failures and skips tasks that depend on a failed task
///
/// Only graph construction errors are returned as `Err`; task failures are
/// collected in the returned [`RunResult`].
pub async fn run(project: &Project, goals: &[Task], config: &ExecuteConfig) -> Result<RunResult, ExecuteError> {
  info!(goals = goals.len(), "starting run");

  let plan = plan(project, goals)?;

  let mut result = RunResult {
    up_to_date: plan.up_to_date.clone(),
    ..Default::default()
  };

  if plan.is_empty() {
    info!("everything up to date");
    return Ok(result);
  }

  info!(tasks = plan.task_count(), wave_count = plan.waves.len(), "computed execution waves");

  let deadline = config.timeout.map(|t| Instant::now() + t);
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let settings = Arc::new(project.compiler.clone());
  let mut failed: HashSet<Task> = HashSet::new();

  for (wave_idx, wave) in plan.waves.iter().enumerate() {
    debug!(wave = wave_idx, tasks = wave.len(), "executing wave");

    let mut jobs = Vec::new();

    for &task in wave {
      let failed_dep = plan.dependencies[&task].iter().find(|dep| failed.contains(*dep));
      if let Some(&dep) = failed_dep {
        warn!(task = %task, failed_dep = %dep, "skipping task due to failed dependency");
        result.skipped.insert(task, dep);
        failed.insert(task);
        continue;
      }

      match prepare(project, task, &settings, config) {
        Ok(job) => jobs.push(job),
        Err(e) => {
          error!(task = %task, error = %e, "task failed");
          failed.insert(task);
          result.failed.push((task, e));
        }
      }
    }

    for (task, outcome) in execute_wave(jobs, semaphore.clone(), deadline).await {
      match outcome {
        Ok(path) => {
          info!(task = %task, path = %path.display(), "task succeeded");
          match task {
            Task::Regenerate(step) => result.regenerated.insert(step, path),
            Task::Compile(step) => result.compiled.insert(step, path),
          };
        }
        Err(e) => {
          error!(task = %task, error = %e, "task failed");
          failed.insert(task);
          result.failed.push((task, e));
        }
      }
    }
  }

  info!(
    regenerated = result.regenerated.len(),
    compiled = result.compiled.len(),
    failed = result.failed.len(),
    skipped = result.skipped.len(),
    "run complete"
  );

  Ok(result)
}

/// Turn a planned task into an owned job.
fn prepare(
  project: &Project,
  task: Task,
  settings: &Arc<CompilerSettings>,
  config: &ExecuteConfig,
) -> Result<Job, ExecuteError> {
  let step = task.step();
  // Planned tasks always come from the table.
  let record = project
    .table
    .get(step)
    .ok_or_else(|| ExecuteError::Io(std::io::Error::other(format!("step {} is not in the project", step))))?;

  match task {
    Task::Regenerate(_) => {
      let template: PathBuf = project.template.clone().ok_or_else(|| {
        ExecuteError::Io(std::io::Error::other("regeneration planned without a template"))
      })?;
      let command = filter_command(
        &project.stepfile.template.filter,
        step,
        &template,
        &project.stepfile.template.marker,
        config.self_exe.as_deref(),
      )?;
      Ok(Job::Generate {
        step,
        command,
        dest: record.source.clone(),
        cwd: project.root.clone(),
      })
    }
    Task::Compile(_) => Ok(Job::Compile {
      step,
      settings: settings.clone(),
      source: record.source.clone(),
      executable: record.executable.clone(),
      cwd: project.root.clone(),
    }),
  }
}

/// Run the jobs of one wave concurrently, each holding a semaphore permit
/// while its process runs. Results come back in completion order.
async fn execute_wave(
  jobs: Vec<Job>,
  semaphore: Arc<Semaphore>,
  deadline: Option<Instant>,
) -> Vec<(Task, Result<PathBuf, ExecuteError>)> {
  let mut join_set = JoinSet::new();
  let mut pending = HashSet::new();

  for job in jobs {
    let semaphore = semaphore.clone();
    pending.insert(job.task());
    join_set.spawn(async move {
      let task = job.task();
      let outcome = match semaphore.acquire_owned().await {
        Ok(_permit) => job.run(deadline).await,
        Err(e) => Err(ExecuteError::Io(std::io::Error::other(e))),
      };
      (task, outcome)
    });
  }

  join_wave(join_set, pending).await
}

/// Collect a wave's results. A task that never reported back (it panicked or
/// was cancelled) is returned as failed rather than dropped.
async fn join_wave(
  mut join_set: JoinSet<(Task, Result<PathBuf, ExecuteError>)>,
  mut pending: HashSet<Task>,
) -> Vec<(Task, Result<PathBuf, ExecuteError>)> {
  let mut results = Vec::new();

  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok((task, outcome)) => {
        pending.remove(&task);
        results.push((task, outcome));
      }
      Err(e) => {
        error!(error = %e, "task panicked");
      }
    }
  }

  let mut lost: Vec<Task> = pending.into_iter().collect();
  lost.sort();
  for task in lost {
    results.push((task, Err(ExecuteError::Panicked { step: task.step() })));
  }

  results
}
