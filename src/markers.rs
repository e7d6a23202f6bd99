//! Marker comment scanning for template files.

use anyhow::{Context, Result};
use regex::Regex;

/// Marker comment recognised in template files when no custom pattern is
/// configured. Capture group 1 holds the entry reference.
pub const DEFAULT_MARKER_PATTERN: &str = r"<!--\s*@vite:entry\s+(\S+)\s*-->";

/// Compiled marker pattern used to scan template text.
///
/// Scanning is stateless: `scan` collects every occurrence on each call, so
/// no cursor state survives between invocations and the same pattern can be
/// reused across unrelated files.
#[derive(Debug, Clone)]
pub struct MarkerPattern {
  regex: Regex,
}

/// One marker occurrence: the matched byte range and the captured entry
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
  /// Byte offset where the matched marker text starts.
  pub start: usize,
  /// Byte offset one past the end of the matched marker text.
  pub end: usize,
  /// Captured entry reference with surrounding whitespace removed.
  pub reference: String,
}

impl Default for MarkerPattern {
  fn default() -> Self {
    Self {
      regex: Regex::new(DEFAULT_MARKER_PATTERN).expect("invalid default marker regex"),
    }
  }
}

impl MarkerPattern {
  /// Compile a custom marker pattern. Capture group 1 must hold the entry
  /// reference.
  pub fn custom(pattern: &str) -> Result<Self> {
    let regex =
      Regex::new(pattern).with_context(|| format!("invalid marker pattern `{pattern}`"))?;
    Ok(Self { regex })
  }

  /// Fast existence check that does not collect matches.
  pub fn contains_marker(&self, text: &str) -> bool {
    self.regex.is_match(text)
  }

  /// Collect every occurrence in document order.
  pub fn scan(&self, text: &str) -> Vec<MarkerMatch> {
    self
      .regex
      .captures_iter(text)
      .filter_map(|captures| {
        let matched = captures.get(0)?;
        let reference = captures.get(1)?;
        Some(MarkerMatch {
          start: matched.start(),
          end: matched.end(),
          reference: reference.as_str().trim().to_string(),
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_pattern_captures_the_entry_reference() {
    let pattern = MarkerPattern::default();
    let matches = pattern.scan("<!-- @vite:entry src/home.js -->");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].reference, "src/home.js");
    assert_eq!(matches[0].start, 0);
  }

  #[test]
  fn whitespace_around_the_reference_is_insignificant() {
    let pattern = MarkerPattern::default();
    let matches = pattern.scan("<!--@vite:entry   src/admin.js-->");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].reference, "src/admin.js");
  }

  #[test]
  fn scan_visits_every_occurrence_in_order() {
    let pattern = MarkerPattern::default();
    let text = "a <!-- @vite:entry one.js --> b <!-- @vite:entry two.js --> c";
    let matches = pattern.scan(text);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].reference, "one.js");
    assert_eq!(matches[1].reference, "two.js");
    assert!(matches[0].end <= matches[1].start);
  }

  #[test]
  fn repeated_scans_over_the_same_text_agree() {
    let pattern = MarkerPattern::default();
    let text = "<!-- @vite:entry a.js --><!-- @vite:entry b.js -->";
    assert!(pattern.contains_marker(text));
    assert_eq!(pattern.scan(text), pattern.scan(text));
  }

  #[test]
  fn text_without_markers_yields_nothing() {
    let pattern = MarkerPattern::default();
    assert!(!pattern.contains_marker("<div>plain markup</div>"));
    assert!(pattern.scan("<div>plain markup</div>").is_empty());
  }

  #[test]
  fn custom_patterns_are_honoured() {
    let pattern = MarkerPattern::custom(r"@@inject\((\S+)\)").unwrap();
    let matches = pattern.scan("before @@inject(src/app.js) after");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].reference, "src/app.js");
  }

  #[test]
  fn invalid_custom_patterns_fail_compilation() {
    assert!(MarkerPattern::custom("([unclosed").is_err());
  }
}
