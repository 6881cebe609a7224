//! `dump`: print what the project loader derived.

use anyhow::Result;

use stepmake_lib::housekeeping::dump;
use stepmake_lib::project::Project;

use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

pub fn cmd_dump(project: &Project, output: OutputFormat) -> Result<()> {
  let report = dump(project);

  if output.is_json() {
    return print_json(&report);
  }

  let none = || "(none)".to_string();
  let list = |items: &[String]| if items.is_empty() { none() } else { items.join(" ") };

  print_info(&format!("Project {}", report.root.display()));
  print_stat(
    "Project file",
    &report.project_file.as_ref().map_or_else(none, |p| p.display().to_string()),
  );
  print_stat("Steps dir", &report.steps_dir.display().to_string());
  print_stat("Pattern", &report.pattern);
  print_stat(
    "Template",
    &report.template.as_ref().map_or_else(none, |p| p.display().to_string()),
  );
  print_stat("Marker", &report.marker);
  print_stat("Filter", &list(&report.filter));

  println!();
  print_info("Compiler");
  let compiler = &report.compiler;
  print_stat("Program", &compiler.program);
  print_stat("Flags", &list(&compiler.flags));
  print_stat("Opt level", compiler.opt_level.as_deref().unwrap_or("(none)"));
  print_stat("Debug", compiler.debug.as_deref().unwrap_or("(none)"));
  print_stat("Libs", &list(&compiler.libs));
  print_stat(
    "SDK root",
    &compiler.sdk_root.as_ref().map_or_else(none, |p| p.display().to_string()),
  );
  print_stat("Verbose", &compiler.verbose.to_string());
  let paths = |items: &[std::path::PathBuf]| {
    let items: Vec<String> = items.iter().map(|p| p.display().to_string()).collect();
    list(&items)
  };
  print_stat("Support", &paths(&compiler.support));
  print_stat("Extra deps", &paths(&compiler.extra_deps));

  println!();
  print_info(&format!("Steps ({})", report.steps.len()));
  for row in &report.steps {
    let state = if row.executable_exists { "built" } else { "missing" };
    println!(
      "  {:>3}  {:<6} {:<7} {} {} {} [{}]",
      row.step,
      row.build_alias,
      row.regen_alias,
      row.source.display(),
      symbols::ARROW,
      row.executable.display(),
      state
    );
    println!("       {}", row.compile_command);
  }

  println!();
  print_stat("all", &list(&report.all));
  print_stat("regenerate-all", &list(&report.regenerate_all));

  Ok(())
}
