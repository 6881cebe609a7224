//! `stepmake filter`: the built-in template filter.
//!
//! Used as the default filter command, so it must write nothing but the
//! filtered template to stdout.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};

use stepmake_lib::filter::filter_template;
use stepmake_lib::rules::StepIndex;

pub fn cmd_filter(step: StepIndex, marker: &str, template: &Path) -> Result<()> {
  let file = File::open(template).with_context(|| format!("Failed to open template {}", template.display()))?;

  let filtered = filter_template(BufReader::new(file), step, marker)
    .with_context(|| format!("Failed to filter {}", template.display()))?;

  let mut stdout = std::io::stdout().lock();
  stdout.write_all(filtered.as_bytes()).context("Failed to write to stdout")?;
  stdout.flush().context("Failed to write to stdout")?;

  Ok(())
}
