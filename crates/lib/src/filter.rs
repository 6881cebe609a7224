//! Built-in template line filter.
//!
//! A template line is tagged when it contains the marker followed by a step
//! number or letter, for example `int x; // @step 2` or `// @step A`. Untagged lines belong to every step.
//! Filtering for step `k` keeps untagged lines and lines tagged `<= k`,
//! verbatim and in their original order.

use std::io::{self, BufRead};

use thiserror::Error;

use crate::rules::StepIndex;

#[derive(Debug, Error)]
pub enum FilterError {
  #[error("failed to read template: {0}")]
  Io(#[from] io::Error),

  #[error("line {line}: marker `{marker}` is not followed by a step number or letter")]
  BadTag { line: usize, marker: String },
}

/// Find the step tag of a line. The last marker occurrence wins.
pub fn line_tag(line: &str, marker: &str) -> Result<Option<StepIndex>, String> {
  let Some(pos) = line.rfind(marker) else {
    return Ok(None);
  };
  let rest = line[pos + marker.len()..].trim_start();
  let end = rest
    .find(|c: char| !c.is_ascii_alphanumeric())
    .unwrap_or(rest.len());
  let token = &rest[..end];
  if token.is_empty() {
    return Err("missing step number".to_string());
  }
  token.parse::<StepIndex>().map(Some).map_err(|e| e.to_string())
}

/// Filter a template for one step.
pub fn filter_template<R: BufRead>(reader: R, step: StepIndex, marker: &str) -> Result<String, FilterError> {
  let mut out = String::new();

  for (idx, line) in reader.lines().enumerate() {
    let line = line?;
    let tag = line_tag(&line, marker).map_err(|_| FilterError::BadTag {
      line: idx + 1,
      marker: marker.to_string(),
    })?;

    if tag.is_none_or(|t| t <= step) {
      out.push_str(&line);
      out.push('\n');
    }
  }

  Ok(out)
}
