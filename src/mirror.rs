//! Output tree mirroring under the dev and build roots.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use same_file::is_same_file;
use tracing::debug;

/// Relative location a source file mirrors to below an output root.
///
/// Sources outside `source_root` fall back to their file name so every write
/// lands inside the mirror.
pub fn mirror_relative(source_root: &Path, source: &Path) -> PathBuf {
  match source.strip_prefix(source_root) {
    Ok(relative) if !relative.as_os_str().is_empty() && !relative.starts_with("..") => {
      relative.to_path_buf()
    }
    _ => base_name(source),
  }
}

/// Absolute mirror location for `source` below `out_root`.
pub fn mirror_target(out_root: &Path, source_root: &Path, source: &Path) -> PathBuf {
  out_root.join(mirror_relative(source_root, source))
}

/// Write `content` at the mirror location for `source`, creating intermediate
/// directories and overwriting unconditionally.
pub fn write_mirrored(
  out_root: &Path,
  source_root: &Path,
  source: &Path,
  content: &str,
) -> Result<PathBuf> {
  let target = mirror_target(out_root, source_root, source);
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  // A previous verbatim pass may have hard-linked the target to the source;
  // writing through that link would corrupt the source file.
  if target.exists() && is_same_file(source, &target).unwrap_or(false) {
    fs::remove_file(&target).with_context(|| format!("failed to replace {}", target.display()))?;
  }

  fs::write(&target, content).with_context(|| format!("failed to write {}", target.display()))?;
  debug!(target = %target.display(), "mirrored rewritten template");
  Ok(target)
}

/// Copy `source` verbatim to its mirror location below `out_root`.
pub fn copy_mirrored(out_root: &Path, source_root: &Path, source: &Path) -> Result<PathBuf> {
  let target = mirror_target(out_root, source_root, source);
  copy_verbatim(source, &target)?;
  Ok(target)
}

/// Install an unmodified copy of `source` at `target`, preferring hard links
/// and falling back to a byte copy where linking is unsupported.
pub fn copy_verbatim(source: &Path, target: &Path) -> Result<()> {
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  if target.exists() {
    if is_same_file(source, target)
      .with_context(|| format!("failed to compare {} with {}", source.display(), target.display()))?
    {
      return Ok(());
    }
    fs::remove_file(target).with_context(|| format!("failed to replace {}", target.display()))?;
  }

  match fs::hard_link(source, target) {
    Ok(()) => Ok(()),
    Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
    Err(_) => fs::copy(source, target).map(|_| ()).with_context(|| {
      format!("failed to copy {} to {}", source.display(), target.display())
    }),
  }
}

/// Remove every file below `root` whose relative path is not in `keep`,
/// deleting directories that end up empty.
pub fn prune_stale(root: &Path, keep: &BTreeSet<PathBuf>) -> std::io::Result<()> {
  if !root.exists() {
    return Ok(());
  }

  prune_subtree(root, Path::new(""), keep)?;
  Ok(())
}

fn prune_subtree(
  root: &Path,
  relative: &Path,
  keep: &BTreeSet<PathBuf>,
) -> std::io::Result<bool> {
  let current = if relative.as_os_str().is_empty() {
    root.to_path_buf()
  } else {
    root.join(relative)
  };

  let mut has_kept_descendants = false;
  let entries = match fs::read_dir(&current) {
    Ok(entries) => entries,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
    Err(err) => return Err(err),
  };

  for entry in entries {
    let entry = entry?;
    let file_name = entry.file_name();
    let child_relative = if relative.as_os_str().is_empty() {
      PathBuf::from(&file_name)
    } else {
      relative.join(&file_name)
    };

    let file_type = entry.file_type()?;
    let entry_path = entry.path();
    if file_type.is_dir() {
      if prune_subtree(root, &child_relative, keep)? {
        fs::remove_dir_all(&entry_path)?;
      } else {
        has_kept_descendants = true;
      }
    } else if keep.contains(&child_relative) {
      has_kept_descendants = true;
    } else {
      fs::remove_file(&entry_path)?;
    }
  }

  Ok(!has_kept_descendants && !relative.as_os_str().is_empty())
}

fn base_name(source: &Path) -> PathBuf {
  PathBuf::from(source.file_name().unwrap_or(source.as_os_str()))
}
