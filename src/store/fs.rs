//! Atomic file publication.
//!
//! Files read by a later stage are written to a sibling temporary file, synced,
//! then renamed over the destination so a reader sees either the old or the new
//! content, never a partial write.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Sibling temporary path used while publishing `path`
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
  let mut name = path
    .file_name()
    .map(|n| n.to_os_string())
    .unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}

/// Write `bytes` to `path` with replace-or-absent semantics
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      std::fs::create_dir_all(parent)?;
    }
  }

  let tmp_path = tmp_path_for(path);
  let mut file = OpenOptions::new()
    .create(true)
    .truncate(true)
    .write(true)
    .open(&tmp_path)?;
  file.write_all(bytes)?;
  file.sync_all()?;
  drop(file);

  if let Err(e) = std::fs::rename(&tmp_path, path) {
    let _ = std::fs::remove_file(&tmp_path);
    return Err(e.into());
  }
  sync_parent_dir(path.parent())?;
  Ok(())
}

/// Publish a copy of `src` at `dst`
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
  let bytes = std::fs::read(src)?;
  write_atomic(dst, &bytes)
}

fn sync_parent_dir(parent: Option<&Path>) -> Result<()> {
  #[cfg(unix)]
  {
    if let Some(parent) = parent {
      let dir = if parent.as_os_str().is_empty() {
        Path::new(".")
      } else {
        parent
      };
      std::fs::File::open(dir)?.sync_all()?;
    }
  }

  #[cfg(not(unix))]
  {
    let _ = parent;
  }

  Ok(())
}
