//! Project loading.
//!
//! A [`Project`] is everything known before any work starts: the parsed project
//! file, resolved toolchain settings, and the step table. Loading validates
//! the layout so broken projects fail before a single process is spawned.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CompilerSettings, ConfigError, Overrides, Stepfile};
use crate::consts::PROJECT_FILE;
use crate::discovery::{DiscoveryError, StepPattern, discover_except};
use crate::execute::Task;
use crate::rules::{Aliases, StepTable, Target, TargetError};
use crate::util::fs::join_clean;

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Discovery(#[from] DiscoveryError),

  #[error(transparent)]
  Target(#[from] TargetError),
}

/// Where to find a project and how to override its toolchain values.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
  /// Project root. Relative paths in the project file resolve against it.
  pub root: PathBuf,
  /// Explicit project file; when unset `Stepfile.toml` in the root is used if present.
  pub file: Option<PathBuf>,
  pub overrides: Overrides,
}

#[derive(Debug, Clone)]
pub struct Project {
  pub root: PathBuf,
  /// The project file, if one was read. Its timestamp feeds regeneration staleness.
  pub project_file: Option<PathBuf>,
  pub stepfile: Stepfile,
  pub steps_dir: PathBuf,
  pub template: Option<PathBuf>,
  pub compiler: CompilerSettings,
  pub table: StepTable,
}

impl Project {
  pub fn load(options: &LoadOptions) -> Result<Self, ProjectError> {
    let root = dunce::canonicalize(&options.root).map_err(|_| ConfigError::StepsDirMissing(options.root.clone()))?;

    let project_file = match &options.file {
      Some(file) => Some(join_clean(&root, file)),
      None => Some(root.join(PROJECT_FILE)).filter(|p| p.is_file()),
    };

    let stepfile = match &project_file {
      Some(path) => Stepfile::load(path)?,
      None => {
        debug!(root = %root.display(), "no project file, using defaults");
        Stepfile::default()
      }
    };

    let steps_dir = join_clean(&root, &stepfile.steps.dir);
    if !steps_dir.is_dir() {
      return Err(ConfigError::StepsDirMissing(steps_dir).into());
    }

    let template = stepfile.template.path.as_ref().map(|p| join_clean(&root, p));
    if let Some(template) = &template
      && !template.is_file()
    {
      return Err(ConfigError::MissingTemplate(template.clone()).into());
    }

    let compiler = stepfile.compiler.resolve(&root, &options.overrides);
    for path in compiler.support.iter().chain(&compiler.extra_deps) {
      if !path.is_file() {
        return Err(ConfigError::MissingSupportFile(path.clone()).into());
      }
    }

    let pattern = StepPattern::new(&stepfile.steps.prefix, &stepfile.steps.extension).map_err(|e| {
      ConfigError::InvalidValue {
        key: "steps.prefix",
        message: e.to_string(),
      }
    })?;
    let shared: Vec<&Path> = template
      .iter()
      .chain(&compiler.support)
      .chain(&compiler.extra_deps)
      .map(PathBuf::as_path)
      .collect();
    let sources = discover_except(&steps_dir, &pattern, &shared)?;

    let aliases = Aliases {
      build: stepfile.steps.build_alias.clone(),
      regen: stepfile.steps.regen_alias.clone(),
    };
    let table = StepTable::from_sources(sources, aliases)?;

    let project = Self {
      root,
      project_file,
      stepfile,
      steps_dir,
      template,
      compiler,
      table,
    };
    project.check_overlaps()?;

    info!(
      root = %project.root.display(),
      steps = project.table.len(),
      template = project.template.is_some(),
      "project loaded"
    );

    Ok(project)
  }

  /// A shared input must not sit where a step executable is written, or a
  /// compile would overwrite it.
  fn check_overlaps(&self) -> Result<(), ConfigError> {
    let shared: Vec<&Path> = self
      .template
      .iter()
      .chain(&self.compiler.support)
      .chain(&self.compiler.extra_deps)
      .map(PathBuf::as_path)
      .collect();

    for record in self.table.records() {
      if let Some(path) = shared.iter().find(|p| same_file(p, &record.executable)) {
        return Err(ConfigError::InvalidValue {
          key: "compiler.support",
          message: format!("shared input {} is the executable of step {}", path.display(), record.step),
        });
      }
    }
    Ok(())
  }

  /// Resolve target names, in order.
  pub fn parse_targets<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Target>, ProjectError> {
    names
      .iter()
      .map(|name| self.table.parse_target(name.as_ref()).map_err(ProjectError::from))
      .collect()
  }

  /// Translate build-like targets into goal tasks.
  ///
  /// Regeneration goals need a template.
  pub fn goals(&self, targets: &[Target]) -> Result<Vec<Task>, ConfigError> {
    let mut goals = Vec::new();

    for target in targets {
      match *target {
        Target::All => goals.extend(self.table.indices().map(Task::Compile)),
        Target::Build(step) => goals.push(Task::Compile(step)),
        Target::RegenerateAll => {
          self.require_template()?;
          goals.extend(self.table.indices().map(Task::Regenerate));
        }
        Target::Regenerate(step) => {
          self.require_template()?;
          goals.push(Task::Regenerate(step));
        }
        Target::Clean | Target::Dump => {}
      }
    }

    goals.sort();
    goals.dedup();
    Ok(goals)
  }

  fn require_template(&self) -> Result<(), ConfigError> {
    if self.template.is_none() {
      return Err(ConfigError::NoTemplate);
    }
    Ok(())
  }
}

fn same_file(a: &Path, b: &Path) -> bool {
  match (dunce::canonicalize(a), dunce::canonicalize(b)) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}
