//! Live development rewriting pointing markers at the module server.

use std::path::Path;

use crate::markers::MarkerPattern;
use crate::models::{Mode, RenderContext};
use crate::paths;
use crate::render::AssetRenderer;

/// Path the live-reload client script is served from on the dev origin.
pub const CLIENT_PATH: &str = "@vite/client";

/// Rewrite every marker in `text` to point at the dev server at `origin`.
///
/// Text without markers is returned unchanged. The captured reference is
/// resolved against `root` purely to identify the module; dev mode never
/// validates it against the bundler, since the browser requests the file
/// live. The live-reload client URL is injected only on the first occurrence
/// so a file never bootstraps the client twice.
pub fn rewrite_for_dev(
  text: &str,
  template: &Path,
  root: &Path,
  origin: &str,
  pattern: &MarkerPattern,
  renderer: &dyn AssetRenderer,
) -> String {
  let matches = pattern.scan(text);
  if matches.is_empty() {
    return text.to_string();
  }

  let origin = origin.trim_end_matches('/');
  let mut output = String::with_capacity(text.len());
  let mut cursor = 0;
  let mut first = true;

  for occurrence in &matches {
    let reference = paths::strip_leading_separator(&occurrence.reference);
    let context = RenderContext {
      mode: Mode::Dev,
      template,
      reference: &occurrence.reference,
      module: root.join(reference),
      js_url: format!("{origin}/{reference}"),
      css_urls: Vec::new(),
      client_url: first.then(|| format!("{origin}/{CLIENT_PATH}")),
      artifact: None,
    };
    first = false;

    output.push_str(&text[cursor..occurrence.start]);
    output.push_str(&renderer.render(&context));
    cursor = occurrence.end;
  }

  output.push_str(&text[cursor..]);
  output
}
