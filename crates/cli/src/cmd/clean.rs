use std::time::Instant;

use anyhow::Result;

use stepmake_lib::housekeeping::clean;
use stepmake_lib::project::Project;

use super::RunOptions;
use crate::output::{format_duration, print_info, print_json, print_stat, print_success, print_warning};

pub fn cmd_clean(project: &Project, options: &RunOptions) -> Result<()> {
  let start = Instant::now();

  let result = clean(project, options.dry_run);

  if options.output.is_json() {
    print_json(&result)?;
    return Ok(());
  }

  for (path, reason) in &result.errors {
    print_warning(&format!("Could not remove {}: {}", path.display(), reason));
  }

  if options.dry_run {
    print_info("Dry run - no changes made");
    for path in &result.removed_paths {
      println!("  {}", path.display());
    }
  } else {
    print_success("Clean complete!");
  }
  print_stat("Executables removed", &result.stats.executables_removed.to_string());
  print_stat("Temporary files removed", &result.stats.temporaries_removed.to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
