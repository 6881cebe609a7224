//! `clean` and `dump`.
//!
//! Neither touches the build graph: `clean` only knows which files the
//! project produces, `dump` only reports what loading the project derived.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CompilerSettings;
use crate::execute::actions::compile_command;
use crate::project::Project;
use crate::rules::StepIndex;
use crate::util::fs::{remove_if_exists, tmp_path_for};

#[derive(Debug, Default, Serialize)]
pub struct CleanStats {
  pub executables_removed: usize,
  pub temporaries_removed: usize,
  pub absent: usize,
}

#[derive(Debug, Serialize)]
pub struct CleanResult {
  pub stats: CleanStats,
  pub removed_paths: Vec<PathBuf>,
  /// Files that could not be removed, with the reason.
  pub errors: Vec<(PathBuf, String)>,
  pub dry_run: bool,
}

impl CleanResult {
  pub fn total_removed(&self) -> usize {
    self.stats.executables_removed + self.stats.temporaries_removed
  }
}

/// Remove every step executable and leftover temporary output.
///
/// Step sources are never touched. Missing files are counted, not reported as
/// errors, so cleaning twice succeeds.
pub fn clean(project: &Project, dry_run: bool) -> CleanResult {
  let mut result = CleanResult {
    stats: CleanStats::default(),
    removed_paths: Vec::new(),
    errors: Vec::new(),
    dry_run,
  };

  for record in project.table.records() {
    sweep(&record.executable, false, dry_run, &mut result);
    sweep(&tmp_path_for(&record.executable), true, dry_run, &mut result);
    sweep(&tmp_path_for(&record.source), true, dry_run, &mut result);
  }

  info!(
    removed = result.total_removed(),
    absent = result.stats.absent,
    errors = result.errors.len(),
    dry_run,
    "clean complete"
  );

  result
}

fn sweep(path: &Path, temporary: bool, dry_run: bool, result: &mut CleanResult) {
  let removed = if dry_run {
    Ok(path.is_file())
  } else {
    remove_if_exists(path)
  };

  match removed {
    Ok(true) => {
      debug!(path = %path.display(), dry_run, "removed");
      if temporary {
        result.stats.temporaries_removed += 1;
      } else {
        result.stats.executables_removed += 1;
      }
      result.removed_paths.push(path.to_path_buf());
    }
    Ok(false) => {
      if !temporary {
        result.stats.absent += 1;
      }
    }
    Err(e) => {
      warn!(path = %path.display(), error = %e, "failed to remove");
      result.errors.push((path.to_path_buf(), e.to_string()));
    }
  }
}

/// One row of the step table as reported by `dump`.
#[derive(Debug, Serialize)]
pub struct StepRow {
  pub step: StepIndex,
  pub name: String,
  pub source: PathBuf,
  pub executable: PathBuf,
  pub build_alias: String,
  pub regen_alias: String,
  pub executable_exists: bool,
  /// The compiler command a build of this step would run.
  pub compile_command: String,
}

/// Everything derived while loading a project.
#[derive(Debug, Serialize)]
pub struct DumpReport {
  pub root: PathBuf,
  pub project_file: Option<PathBuf>,
  pub steps_dir: PathBuf,
  /// Naming pattern step sources must follow.
  pub pattern: String,
  pub template: Option<PathBuf>,
  pub marker: String,
  pub filter: Vec<String>,
  pub compiler: CompilerSettings,
  pub steps: Vec<StepRow>,
  /// Targets `all` expands to.
  pub all: Vec<String>,
  /// Targets `regenerate-all` expands to.
  pub regenerate_all: Vec<String>,
}

/// Describe the project. Reads nothing beyond file existence.
pub fn dump(project: &Project) -> DumpReport {
  let steps_config = &project.stepfile.steps;
  let template_config = &project.stepfile.template;

  let steps = project
    .table
    .records()
    .map(|record| StepRow {
      step: record.step,
      name: record.name.clone(),
      source: record.source.clone(),
      executable: record.executable.clone(),
      build_alias: record.build_alias.clone(),
      regen_alias: record.regen_alias.clone(),
      executable_exists: record.executable.is_file(),
      compile_command: compile_command(&project.compiler, &record.source, &record.executable).to_string(),
    })
    .collect();

  DumpReport {
    root: project.root.clone(),
    project_file: project.project_file.clone(),
    steps_dir: project.steps_dir.clone(),
    pattern: format!("{}<N>_*.{}", steps_config.prefix, steps_config.extension),
    template: project.template.clone(),
    marker: template_config.marker.clone(),
    filter: template_config.filter.clone(),
    compiler: project.compiler.clone(),
    steps,
    all: project.table.all_build_aliases().into_iter().map(String::from).collect(),
    regenerate_all: project.table.all_regen_aliases().into_iter().map(String::from).collect(),
  }
}
