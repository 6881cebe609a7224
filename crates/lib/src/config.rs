//! Project file (`Stepfile.toml`) parsing and toolchain settings resolution.
//!
//! Values are layered: command-line overrides win over environment variables,
//! which win over the project file, which wins over built-in defaults.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
  DEFAULT_MARKER, ENV_CC, ENV_DEBUG, ENV_OPT, ENV_SDKROOT, ENV_VERBOSE, PH_MARKER, PH_SELF, PH_STEP, PH_TEMPLATE,
};
use crate::rules::StepIndex;
use crate::util::fs::join_clean;

/// Errors describing a broken project layout or configuration.
///
/// All of these abort a run before any external process is started.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read project file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse project file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("invalid value for `{key}`: {message}")]
  InvalidValue { key: &'static str, message: String },

  #[error("steps directory does not exist: {0}")]
  StepsDirMissing(PathBuf),

  #[error("step {step} is defined twice: {first} and {second}")]
  DuplicateStep {
    step: StepIndex,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("support file not found: {0}")]
  MissingSupportFile(PathBuf),

  #[error("template file not found: {0}")]
  MissingTemplate(PathBuf),

  #[error("no template configured: regeneration targets need [template].path")]
  NoTemplate,
}

/// The parsed project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Stepfile {
  pub steps: StepsConfig,
  pub template: TemplateConfig,
  pub compiler: CompilerConfig,
}

/// Where step sources live and how their names are shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepsConfig {
  pub dir: PathBuf,
  pub prefix: String,
  pub extension: String,
  pub build_alias: String,
  pub regen_alias: String,
}

impl Default for StepsConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("."),
      prefix: "step".to_string(),
      extension: "c".to_string(),
      build_alias: "s".to_string(),
      regen_alias: "ss".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
  /// Annotated source holding every step. Optional: without it, step sources are plain inputs.
  pub path: Option<PathBuf>,
  /// Tag marker recognized by the built-in filter.
  pub marker: String,
  /// Filter command line. Supports `{self}`, `{step}`, `{template}` and `{marker}`.
  pub filter: Vec<String>,
}

impl Default for TemplateConfig {
  fn default() -> Self {
    Self {
      path: None,
      marker: DEFAULT_MARKER.to_string(),
      filter: [PH_SELF, "filter", "--marker", PH_MARKER, "--step", PH_STEP, PH_TEMPLATE]
        .into_iter()
        .map(String::from)
        .collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
  pub program: String,
  pub flags: Vec<String>,
  pub opt_level: Option<String>,
  pub debug: Option<String>,
  pub libs: Vec<String>,
  pub sdk_root: Option<PathBuf>,
  pub verbose: bool,
  /// Shared sources passed to every compile.
  pub support: Vec<PathBuf>,
  /// Files every compile depends on without being passed to the compiler.
  pub extra_deps: Vec<PathBuf>,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    Self {
      program: "cc".to_string(),
      flags: Vec::new(),
      opt_level: Some("-O2".to_string()),
      debug: Some("-g".to_string()),
      libs: Vec::new(),
      sdk_root: None,
      verbose: false,
      support: Vec::new(),
      extra_deps: Vec::new(),
    }
  }
}

/// Toolchain values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub sdk_root: Option<PathBuf>,
  pub opt_level: Option<String>,
  pub debug: Option<String>,
  pub verbose: bool,
}

/// Fully resolved compiler invocation settings. Paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSettings {
  pub program: String,
  pub flags: Vec<String>,
  pub opt_level: Option<String>,
  pub debug: Option<String>,
  pub libs: Vec<String>,
  pub sdk_root: Option<PathBuf>,
  pub verbose: bool,
  pub support: Vec<PathBuf>,
  pub extra_deps: Vec<PathBuf>,
}

impl Stepfile {
  /// Read and parse a project file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Parse project file content. `path` is only used for error messages.
  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    let stepfile: Stepfile = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source: Box::new(source),
    })?;
    stepfile.validate()?;
    Ok(stepfile)
  }

  /// Check values that would otherwise produce confusing targets or commands.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let steps = &self.steps;
    if steps.prefix.is_empty() {
      return Err(invalid("steps.prefix", "must not be empty"));
    }
    if steps.extension.is_empty() || steps.extension.contains('.') {
      return Err(invalid("steps.extension", "must be a bare extension such as `c`"));
    }
    for (key, alias) in [("steps.build_alias", &steps.build_alias), ("steps.regen_alias", &steps.regen_alias)] {
      if alias.is_empty() || !alias.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid(key, "must be one or more ASCII letters"));
      }
    }
    if steps.build_alias == steps.regen_alias {
      return Err(invalid("steps.regen_alias", "must differ from steps.build_alias"));
    }
    if self.template.filter.is_empty() {
      return Err(invalid("template.filter", "must name a program"));
    }
    if self.template.marker.trim().is_empty() {
      return Err(invalid("template.marker", "must not be empty"));
    }
    if self.compiler.program.is_empty() {
      return Err(invalid("compiler.program", "must not be empty"));
    }
    Ok(())
  }
}

fn invalid(key: &'static str, message: &str) -> ConfigError {
  ConfigError::InvalidValue {
    key,
    message: message.to_string(),
  }
}

impl CompilerConfig {
  /// Layer environment variables and command-line overrides over the file values.
  ///
  /// Relative support and dependency paths are resolved against `root`.
  pub fn resolve(&self, root: &Path, overrides: &Overrides) -> CompilerSettings {
    let program = env_value(ENV_CC).unwrap_or_else(|| self.program.clone());

    let opt_level = overrides
      .opt_level
      .clone()
      .or_else(|| std::env::var(ENV_OPT).ok())
      .or_else(|| self.opt_level.clone())
      .filter(|v| !v.is_empty());

    let debug = overrides
      .debug
      .clone()
      .or_else(|| std::env::var(ENV_DEBUG).ok())
      .or_else(|| self.debug.clone())
      .filter(|v| !v.is_empty());

    let sdk_root = overrides
      .sdk_root
      .clone()
      .or_else(|| self.sdk_root.clone())
      .or_else(|| env_value(ENV_SDKROOT).map(PathBuf::from));

    let verbose = overrides.verbose || self.verbose || env_flag(ENV_VERBOSE);

    CompilerSettings {
      program,
      flags: self.flags.clone(),
      opt_level,
      debug,
      libs: self.libs.clone(),
      sdk_root,
      verbose,
      support: self.support.iter().map(|p| join_clean(root, p)).collect(),
      extra_deps: self.extra_deps.iter().map(|p| join_clean(root, p)).collect(),
    }
  }
}

fn env_value(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> bool {
  matches!(
    std::env::var(key).map(|v| v.to_ascii_lowercase()).as_deref(),
    Ok("1" | "true" | "yes" | "on")
  )
}
