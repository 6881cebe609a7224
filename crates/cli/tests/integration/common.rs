//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// A template whose tagged lines grow one step at a time.
pub const TEMPLATE: &str = "#include <stdio.h>
int main(void) {
  puts(\"repl\");
  puts(\"read\"); // @step 1
  puts(\"eval\"); // @step 2
  puts(\"env\"); // @step 3
  return 0;
}
";

/// Compiler stand-in: concatenates its inputs into the `-o` file and logs the
/// primary source name to `compile.log`.
const STUB_COMPILER: &str = r#"#!/bin/sh
out=""
inputs=""
first=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -isysroot) shift 2 ;;
    -*) shift ;;
    *) [ -z "$first" ] && first="$1"; inputs="$inputs $1"; shift ;;
  esac
done
[ -n "$out" ] || exit 2
cat $inputs > "$out" || exit 1
chmod +x "$out"
basename "$first" >> "$(dirname "$out")/compile.log"
"#;

/// Isolated test project.
///
/// Each test gets its own temporary directory holding step sources, a stub
/// compiler and a `Stepfile.toml` pointing at it.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project with steps `0..steps`, a support file and no template.
  pub fn new(steps: u32) -> Self {
    let env = Self::empty();
    env.write_script("fakecc", STUB_COMPILER);
    env.write_file("util.c", "/* util */\n");
    for n in 0..steps {
      env.write_file(&env.source_name(n), &format!("/* step {} */\n", n));
    }
    env.write_stepfile("");
    env.settle();
    env
  }

  /// Like [`TestEnv::new`], with `steps.c` as the template and the built-in filter.
  pub fn with_template(steps: u32) -> Self {
    let env = Self::new(steps);
    env.write_file("steps.c", TEMPLATE);
    env.write_stepfile("[template]\npath = \"steps.c\"\n");
    env.settle();
    env
  }

  /// Create an empty test environment.
  ///
  /// Use this when you need to manually set up the directory structure.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> PathBuf {
    let p = self.temp.path().to_path_buf();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  /// Source file name of step `n`.
  pub fn source_name(&self, n: u32) -> String {
    match n {
      0 => "step0_repl.c".to_string(),
      1 => "step1_read.c".to_string(),
      2 => "step2_eval.c".to_string(),
      n => format!("step{}_more.c", n),
    }
  }

  /// Executable path of step `n`.
  pub fn exe(&self, n: u32) -> PathBuf {
    self.path(self.source_name(n).trim_end_matches(".c"))
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Write an executable script relative to the temp directory.
  pub fn write_script(&self, relative_path: &str, content: &str) -> PathBuf {
    self.write_file(relative_path, content);
    let path = self.path(relative_path);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
  }

  /// Write `Stepfile.toml` using the stub compiler and `util.c`, plus `extra`.
  pub fn write_stepfile(&self, extra: &str) {
    self.write_file(
      "Stepfile.toml",
      &format!(
        "{}\n[compiler]\nprogram = \"{}\"\nsupport = [\"util.c\"]\n",
        extra,
        self.path("fakecc").display()
      ),
    );
  }

  /// Swap the stub compiler for a script that fails with `code`.
  pub fn break_compiler(&self, code: i32) {
    self.write_script(
      "fakecc",
      &format!("#!/bin/sh\necho \"fatal: refusing to compile\" >&2\nexit {}\n", code),
    );
  }

  /// Backdate every file so a build starts from a settled tree: shared inputs
  /// oldest, step sources newer than the template.
  pub fn settle(&self) {
    for entry in std::fs::read_dir(self.temp.path()).unwrap().flatten() {
      let name = entry.file_name().to_string_lossy().into_owned();
      let secs = if name.starts_with("step") && name.ends_with(".c") && name != "steps.c" {
        1800
      } else {
        3600
      };
      self.age(&name, secs);
    }
  }

  /// Set a file's modification time to `secs_ago` seconds in the past.
  pub fn age(&self, relative_path: &str, secs_ago: u64) {
    let file = std::fs::OpenOptions::new()
      .write(true)
      .open(self.path(relative_path))
      .unwrap();
    file
      .set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
      .unwrap();
  }

  pub fn read(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }

  /// Sources passed to the stub compiler, one per invocation.
  pub fn compile_log(&self) -> Vec<String> {
    log_lines(&self.path("compile.log"))
  }

  /// Get a pre-configured Command for the stepmake binary.
  ///
  /// Runs in the project root with the toolchain variables cleared so the
  /// host environment cannot change the compiler or its flags.
  pub fn stepmake(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("stepmake");
    cmd.current_dir(self.root());
    for var in ["CC", "SDKROOT", "STEPMAKE_OPT", "STEPMAKE_DEBUG", "STEPMAKE_VERBOSE", "RUST_LOG"] {
      cmd.env_remove(var);
    }
    cmd
  }
}

pub fn log_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .map(|s| s.lines().map(String::from).collect())
    .unwrap_or_default()
}
