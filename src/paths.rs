//! Path canonicalisation for comparison and set membership.

use std::path::Path;

/// Map a path to its canonical comparison form: forward slashes, no trailing
/// separator, lower case.
///
/// The result is only ever compared against other canonical forms. It must
/// not be used for file system I/O, where separator and case fidelity have to
/// be preserved.
pub fn normalize_for_compare(path: impl AsRef<Path>) -> String {
  let text = path.as_ref().to_string_lossy().replace('\\', "/");
  let trimmed = text.trim_end_matches('/');
  if trimmed.is_empty() {
    "/".to_string()
  } else {
    trimmed.to_lowercase()
  }
}

/// Strip a single leading separator so `/src/x.js` and `src/x.js` name the
/// same module.
pub fn strip_leading_separator(value: &str) -> &str {
  value
    .strip_prefix('/')
    .or_else(|| value.strip_prefix('\\'))
    .unwrap_or(value)
}

/// True when `path` sits at or below `dir`, compared in canonical form.
pub fn is_under(dir: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
  let dir = normalize_for_compare(dir);
  let path = normalize_for_compare(path);
  path == dir || path.starts_with(&format!("{dir}/"))
}
