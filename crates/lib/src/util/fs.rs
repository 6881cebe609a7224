//! Timestamp and atomic-write helpers.
//!
//! Outputs are always written to a sibling temporary path first and renamed
//! over the final name only once they are complete.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::consts::TMP_SUFFIX;

/// Modification time of a file, or `None` if it does not exist.
pub fn mtime(path: &Path) -> io::Result<Option<SystemTime>> {
  match std::fs::metadata(path) {
    Ok(meta) => meta.modified().map(Some),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e),
  }
}

/// Join a relative path onto `base`, dropping `.` components so `dir = "."`
/// does not leave `/root/./step0_repl.c` in every reported path.
pub fn join_clean(base: &Path, rel: &Path) -> PathBuf {
  let mut joined = base.to_path_buf();
  for component in rel.components() {
    match component {
      Component::CurDir => {}
      other => joined.push(other),
    }
  }
  joined
}

/// Hidden sibling path used while `dest` is being produced.
///
/// `dir/step1_read` becomes `dir/.step1_read.stepmake-tmp`.
pub fn tmp_path_for(dest: &Path) -> PathBuf {
  let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  dest.with_file_name(format!(".{}{}", name, TMP_SUFFIX))
}

/// Remove a file, treating absence as success. Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
  match std::fs::remove_file(path) {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
