//! Per-step target table.
//!
//! Every discovered step source gets one [`StepRecord`] holding the paths and
//! target aliases derived from it. The table is built once at startup and is
//! the only place target names are resolved.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::ConfigError;
use crate::discovery::DiscoveredSource;

/// Index of one step in the family.
///
/// Steps are numbered, and a family may end with single-letter steps
/// (`stepA_mal.c`). Letters sort after every number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepIndex {
  Number(u32),
  Letter(char),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid step `{0}`: expected a number or a single letter")]
pub struct ParseStepError(pub String);

impl FromStr for StepIndex {
  type Err = ParseStepError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
      (Some(c), None) if c.is_ascii_alphabetic() => Ok(StepIndex::Letter(c)),
      _ if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s
        .parse::<u32>()
        .map(StepIndex::Number)
        .map_err(|_| ParseStepError(s.to_string())),
      _ => Err(ParseStepError(s.to_string())),
    }
  }
}

impl fmt::Display for StepIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepIndex::Number(n) => f.pad(&n.to_string()),
      StepIndex::Letter(c) => f.pad(c.encode_utf8(&mut [0; 4])),
    }
  }
}

impl Serialize for StepIndex {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      StepIndex::Number(n) => serializer.serialize_u32(*n),
      StepIndex::Letter(c) => serializer.serialize_char(*c),
    }
  }
}

/// Derived paths and aliases for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
  pub step: StepIndex,
  pub source: PathBuf,
  pub executable: PathBuf,
  /// File stem of the source, accepted as a build target name.
  pub name: String,
  pub build_alias: String,
  pub regen_alias: String,
}

/// Target alias prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aliases {
  pub build: String,
  pub regen: String,
}

impl Default for Aliases {
  fn default() -> Self {
    Self {
      build: "s".to_string(),
      regen: "ss".to_string(),
    }
  }
}

/// A target requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
  All,
  RegenerateAll,
  Build(StepIndex),
  Regenerate(StepIndex),
  Clean,
  Dump,
}

impl Target {
  /// Whether the target runs external processes.
  pub fn is_buildlike(self) -> bool {
    matches!(
      self,
      Target::All | Target::RegenerateAll | Target::Build(_) | Target::Regenerate(_)
    )
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
  #[error("unknown target `{0}`")]
  Unknown(String),

  #[error("no step {step} (target `{target}`); known steps: {known}")]
  NoSuchStep {
    target: String,
    step: StepIndex,
    known: String,
  },
}

/// Mapping from step index to its record, ordered by index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepTable {
  #[serde(skip)]
  aliases: Aliases,
  steps: BTreeMap<StepIndex, StepRecord>,
}

impl StepTable {
  /// Build the table from discovered sources.
  ///
  /// Two sources resolving to the same index are a configuration error.
  pub fn from_sources(sources: Vec<DiscoveredSource>, aliases: Aliases) -> Result<Self, ConfigError> {
    let mut steps: BTreeMap<StepIndex, StepRecord> = BTreeMap::new();

    for source in sources {
      if let Some(existing) = steps.get(&source.step) {
        return Err(ConfigError::DuplicateStep {
          step: source.step,
          first: existing.source.clone(),
          second: source.path,
        });
      }

      let record = StepRecord {
        step: source.step,
        executable: executable_path(&source.path),
        name: source.stem,
        build_alias: format!("{}{}", aliases.build, source.step),
        regen_alias: format!("{}{}", aliases.regen, source.step),
        source: source.path,
      };
      steps.insert(source.step, record);
    }

    Ok(Self { aliases, steps })
  }

  pub fn get(&self, step: StepIndex) -> Option<&StepRecord> {
    self.steps.get(&step)
  }

  pub fn records(&self) -> impl Iterator<Item = &StepRecord> {
    self.steps.values()
  }

  pub fn indices(&self) -> impl Iterator<Item = StepIndex> + '_ {
    self.steps.keys().copied()
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Resolve a target name.
  ///
  /// Regeneration aliases are tried before build aliases since the default
  /// `ss` prefix starts with the default `s` prefix.
  pub fn parse_target(&self, name: &str) -> Result<Target, TargetError> {
    match name {
      "all" => return Ok(Target::All),
      "regenerate-all" | "alls" => return Ok(Target::RegenerateAll),
      "clean" => return Ok(Target::Clean),
      "dump" => return Ok(Target::Dump),
      _ => {}
    }

    let mut prefixes = [(&self.aliases.regen, true), (&self.aliases.build, false)];
    prefixes.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));

    for (prefix, regen) in prefixes {
      let Some(rest) = name.strip_prefix(prefix.as_str()) else {
        continue;
      };
      let step = match rest.parse::<StepIndex>() {
        Ok(step) => step,
        Err(_) if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
          return Err(TargetError::Unknown(name.to_string()));
        }
        Err(_) => continue,
      };
      // `ss` with the default aliases is `s` plus the letter `s`, not a step.
      if matches!(step, StepIndex::Letter(_)) && self.get(step).is_none() {
        continue;
      }
      self.require(name, step)?;
      return Ok(if regen {
        Target::Regenerate(step)
      } else {
        Target::Build(step)
      });
    }

    if let Some(record) = self.records().find(|r| r.name == name) {
      return Ok(Target::Build(record.step));
    }

    Err(TargetError::Unknown(name.to_string()))
  }

  fn require(&self, target: &str, step: StepIndex) -> Result<(), TargetError> {
    if self.steps.contains_key(&step) {
      return Ok(());
    }
    let known = self.indices().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
    Err(TargetError::NoSuchStep {
      target: target.to_string(),
      step,
      known: if known.is_empty() { "none".to_string() } else { known },
    })
  }

  /// Umbrella target `all`: every build alias.
  pub fn all_build_aliases(&self) -> Vec<&str> {
    self.records().map(|r| r.build_alias.as_str()).collect()
  }

  /// Umbrella target `regenerate-all`: every regeneration alias.
  pub fn all_regen_aliases(&self) -> Vec<&str> {
    self.records().map(|r| r.regen_alias.as_str()).collect()
  }
}

/// Strip the extension and append the platform executable suffix.
fn executable_path(source: &std::path::Path) -> PathBuf {
  let stripped = source.with_extension("");
  if std::env::consts::EXE_SUFFIX.is_empty() {
    stripped
  } else {
    let mut name = stripped.into_os_string();
    name.push(std::env::consts::EXE_SUFFIX);
    PathBuf::from(name)
  }
}
