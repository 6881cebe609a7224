//! Step source discovery.
//!
//! Scans the steps directory for `<prefix>N_<description>.<ext>` files, where
//! `N` is a number or a single letter (`stepA_mal.c`). A file
//! that carries the prefix and extension but cannot be parsed is an error
//! rather than silently skipped, so a misnamed step never disappears from the
//! build.

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::rules::StepIndex;

#[derive(Debug, Error)]
pub enum DiscoveryError {
  #[error("failed to read steps directory {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot parse step index from {path}: {reason}")]
  UnparsableStep { path: PathBuf, reason: String },
}

/// A step source found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSource {
  pub step: StepIndex,
  pub path: PathBuf,
  /// File name without extension, e.g. `step2_eval`.
  pub stem: String,
}

/// Compiled naming pattern for step sources.
#[derive(Debug, Clone)]
pub struct StepPattern {
  prefix: String,
  extension: String,
  regex: Regex,
}

impl StepPattern {
  pub fn new(prefix: &str, extension: &str) -> Result<Self, regex::Error> {
    let pattern = format!(
      r"^{}(?P<step>[0-9]+|[A-Za-z])_(?P<desc>[A-Za-z0-9_-]+)\.{}$",
      regex::escape(prefix),
      regex::escape(extension)
    );
    Ok(Self {
      prefix: prefix.to_string(),
      extension: extension.to_string(),
      regex: Regex::new(&pattern)?,
    })
  }

  /// Whether a file name is a step candidate at all: prefix, extension and an
  /// `_` between them. `steps.c` next to `step0_repl.c` is not a step.
  pub fn is_candidate(&self, file_name: &str) -> bool {
    if file_name.starts_with('.') {
      return false;
    }
    let suffix = format!(".{}", self.extension);
    file_name
      .strip_prefix(self.prefix.as_str())
      .and_then(|rest| rest.strip_suffix(suffix.as_str()))
      .is_some_and(|middle| middle.contains('_'))
  }

  /// Extract the step index from a candidate file name.
  pub fn step_index(&self, file_name: &str) -> Result<StepIndex, String> {
    let Some(captures) = self.regex.captures(file_name) else {
      return Err(format!(
        "expected `{}N_description.{}` with N a number or one letter",
        self.prefix, self.extension
      ));
    };
    captures["step"].parse::<StepIndex>().map_err(|e| e.to_string())
  }
}

/// List step sources in `dir`, sorted by step index then name.
///
/// The scan is not recursive. Duplicate indices are left for the step table to
/// reject so the error can name both files.
pub fn discover(dir: &Path, pattern: &StepPattern) -> Result<Vec<DiscoveredSource>, DiscoveryError> {
  discover_except(dir, pattern, &[])
}

/// Like [`discover`], but never treats one of `shared` as a step.
///
/// The template and support files live next to the steps and may carry the
/// step prefix (`steps_all.c`).
pub fn discover_except(
  dir: &Path,
  pattern: &StepPattern,
  shared: &[&Path],
) -> Result<Vec<DiscoveredSource>, DiscoveryError> {
  let shared: Vec<PathBuf> = shared
    .iter()
    .map(|p| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()))
    .collect();

  let read_err = |source| DiscoveryError::ReadDir {
    path: dir.to_path_buf(),
    source,
  };

  let mut found = Vec::new();

  for entry in std::fs::read_dir(dir).map_err(read_err)? {
    let entry = entry.map_err(read_err)?;
    let file_type = entry.file_type().map_err(read_err)?;
    if !file_type.is_file() && !file_type.is_symlink() {
      continue;
    }

    let file_name = entry.file_name();
    let Some(name) = file_name.to_str() else {
      trace!(name = ?file_name, "skipping non-UTF-8 file name");
      continue;
    };
    if !pattern.is_candidate(name) {
      continue;
    }

    let path = entry.path();
    if !shared.is_empty() {
      let canonical = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
      if shared.contains(&canonical) {
        trace!(path = %path.display(), "skipping shared input");
        continue;
      }
    }

    let step = pattern
      .step_index(name)
      .map_err(|reason| DiscoveryError::UnparsableStep {
        path: path.clone(),
        reason,
      })?;

    let stem = Path::new(name)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or(name)
      .to_string();

    debug!(step = %step, path = %path.display(), "discovered step source");
    found.push(DiscoveredSource { step, path, stem });
  }

  found.sort_by(|a, b| a.step.cmp(&b.step).then_with(|| a.stem.cmp(&b.stem)));
  Ok(found)
}
