//! Template discovery over glob patterns with an ignore set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::paths;

/// Deduplicated set of directories excluded from discovery and watching.
///
/// Membership is keyed on the canonical comparison form, so the same
/// directory spelled with different separators or casing is stored once. The
/// dev and build output directories are always inserted by the bridge so the
/// engine never treats its own output as input.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
  dirs: BTreeMap<String, PathBuf>,
}

impl IgnoreSet {
  /// Add a directory to the set; duplicates collapse to one entry.
  pub fn insert(&mut self, dir: impl Into<PathBuf>) {
    let dir = dir.into();
    self.dirs.entry(paths::normalize_for_compare(&dir)).or_insert(dir);
  }

  /// True when `path` lies at or below any ignored directory.
  pub fn is_ignored(&self, path: impl AsRef<Path>) -> bool {
    let path = paths::normalize_for_compare(path);
    self
      .dirs
      .keys()
      .any(|dir| path == *dir || path.starts_with(&format!("{dir}/")))
  }

  /// The ignored directories in their original spelling, for handoff to the
  /// host's file watcher.
  pub fn dirs(&self) -> impl Iterator<Item = &Path> {
    self.dirs.values().map(PathBuf::as_path)
  }

  /// Number of distinct ignored directories.
  pub fn len(&self) -> usize {
    self.dirs.len()
  }

  /// True when no directory is ignored.
  pub fn is_empty(&self) -> bool {
    self.dirs.is_empty()
  }
}

/// Discover template files matching any of `patterns` below `root`, skipping
/// ignored directories. Results are absolute, deduplicated and sorted.
///
/// Discovery is synchronous so watch event handlers can re-run it inline.
pub fn discover_templates(
  root: &Path,
  patterns: &[String],
  ignore: &IgnoreSet,
) -> Result<Vec<PathBuf>> {
  let mut seen = BTreeSet::new();
  let mut found = Vec::new();

  for pattern in patterns {
    let absolute = if Path::new(pattern).is_absolute() {
      pattern.clone()
    } else {
      format!(
        "{}/{}",
        root.to_string_lossy().trim_end_matches('/'),
        pattern
      )
    };

    let entries =
      glob::glob(&absolute).with_context(|| format!("invalid template pattern `{pattern}`"))?;
    for entry in entries {
      let path =
        entry.with_context(|| format!("failed to read a match for pattern `{pattern}`"))?;
      if !path.is_file() || ignore.is_ignored(&path) {
        continue;
      }
      if seen.insert(paths::normalize_for_compare(&path)) {
        found.push(path);
      }
    }
  }

  found.sort();
  debug!(count = found.len(), "discovered template files");
  Ok(found)
}
