mod build;
mod clean;
mod dump;
mod filter;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use stepmake_lib::config::Overrides;
use stepmake_lib::project::{LoadOptions, Project};
use stepmake_lib::rules::Target;

use crate::output::OutputFormat;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use dump::cmd_dump;
pub use filter::cmd_filter;

/// Options shared by every target in one invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub directory: PathBuf,
  pub file: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub timeout: Option<Duration>,
  pub sdk_root: Option<PathBuf>,
  pub opt_level: Option<String>,
  pub debug: Option<String>,
  pub verbose: bool,
  pub dry_run: bool,
  pub output: OutputFormat,
}

/// Consecutive targets handled as one unit.
#[derive(Debug, PartialEq, Eq)]
enum Batch {
  Build(Vec<Target>),
  Clean,
  Dump,
}

/// Group targets left to right; neighbouring build-like targets share one run.
fn batches(targets: &[Target]) -> Vec<Batch> {
  let mut batches = Vec::new();

  for &target in targets {
    match target {
      Target::Clean => batches.push(Batch::Clean),
      Target::Dump => batches.push(Batch::Dump),
      _ => match batches.last_mut() {
        Some(Batch::Build(group)) => group.push(target),
        _ => batches.push(Batch::Build(vec![target])),
      },
    }
  }

  batches
}

fn load_project(options: &RunOptions) -> Result<Project> {
  let load = LoadOptions {
    root: options.directory.clone(),
    file: options.file.clone(),
    overrides: Overrides {
      sdk_root: options.sdk_root.clone(),
      opt_level: options.opt_level.clone(),
      debug: options.debug.clone(),
      verbose: options.verbose,
    },
  };
  Project::load(&load).with_context(|| format!("Failed to load project in {}", options.directory.display()))
}

/// Load the project and process `names` in order.
///
/// Every name is resolved before anything runs. Processing stops at the first
/// failing build; its exit code is returned.
pub fn run_targets(options: &RunOptions, names: &[String]) -> Result<i32> {
  let project = load_project(options)?;
  let targets = project.parse_targets(names)?;

  for batch in batches(&targets) {
    match batch {
      Batch::Build(targets) => {
        let code = cmd_build(&project, &targets, options)?;
        if code != 0 {
          return Ok(code);
        }
      }
      Batch::Clean => cmd_clean(&project, options)?,
      Batch::Dump => cmd_dump(&project, options.output)?,
    }
  }

  Ok(0)
}
