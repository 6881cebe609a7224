//! Test utilities for stepmake-lib.
//!
//! Stub toolchain scripts that stand in for a real compiler and filter. Each
//! stub appends one line per invocation to a log file next to its output so
//! tests can count how often it ran.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  let mut perms = std::fs::metadata(path).unwrap().permissions();
  perms.set_mode(0o755);
  std::fs::set_permissions(path, perms).unwrap();
  path.to_path_buf()
}

/// A compiler that concatenates its inputs into the `-o` output.
///
/// Logs the primary source name to `compile.log` in the output directory.
#[cfg(unix)]
pub fn stub_compiler(dir: &Path) -> PathBuf {
  write_script(
    &dir.join("fakecc"),
    r#"out=""
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
basename "$first" >> "$(dirname "$out")/compile.log""#,
  )
}

/// A compiler that always fails with exit code 1.
#[cfg(unix)]
pub fn failing_compiler(dir: &Path) -> PathBuf {
  write_script(&dir.join("badcc"), "echo \"fatal: refusing to compile\" >&2\nexit 1")
}

/// A filter called as `filter STEP TEMPLATE` that prefixes the template with a header.
///
/// Logs the step to `regen.log` in the working directory.
#[cfg(unix)]
pub fn stub_filter(dir: &Path) -> PathBuf {
  write_script(
    &dir.join("fakefilter"),
    "echo \"$1\" >> regen.log\necho \"// step $1\"\ncat \"$2\"",
  )
}

/// Read a stub log as lines; missing log means no invocations.
pub fn log_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .map(|s| s.lines().map(String::from).collect())
    .unwrap_or_default()
}

/// Set a file's modification time to `secs_ago` seconds in the past.
pub fn age(path: &Path, secs_ago: u64) {
  let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
  file
    .set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
    .unwrap();
}
