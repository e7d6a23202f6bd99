//! Production rewriting against the bundler's finished artifact set.

use std::path::Path;

use tracing::warn;

use crate::markers::MarkerPattern;
use crate::models::{ArtifactManifest, Mode, RenderContext};
use crate::paths;
use crate::render::AssetRenderer;

/// Join the public base URL and an artifact name with exactly one separator,
/// regardless of how either side spells its edges.
pub fn public_url(base: &str, artifact_name: &str) -> String {
  let base = base.trim_end_matches('/');
  let name = paths::strip_leading_separator(artifact_name);
  format!("{base}/{name}")
}

/// Diagnostic comment substituted when a marker has no matching artifact.
///
/// A single unresolved marker must not abort the whole pass; the placeholder
/// makes the miss visible in the affected output file only.
pub fn missing_artifact_placeholder(reference: &str) -> String {
  format!("<!-- template_asset_bridge: no bundle output for \"{reference}\" -->")
}

/// Rewrite every marker in `text` against the finished `manifest`, prefixing
/// artifact names with `base`. Text without markers is returned unchanged.
pub fn rewrite_for_build(
  text: &str,
  template: &Path,
  root: &Path,
  base: &str,
  manifest: &ArtifactManifest,
  pattern: &MarkerPattern,
  renderer: &dyn AssetRenderer,
) -> String {
  let matches = pattern.scan(text);
  if matches.is_empty() {
    return text.to_string();
  }

  let mut output = String::with_capacity(text.len());
  let mut cursor = 0;

  for occurrence in &matches {
    let module = root.join(paths::strip_leading_separator(&occurrence.reference));
    let replacement = match manifest.entry_for_module(&module) {
      Some(artifact) => {
        let context = RenderContext {
          mode: Mode::Build,
          template,
          reference: &occurrence.reference,
          module,
          js_url: public_url(base, &artifact.file_name),
          css_urls: artifact.css.iter().map(|css| public_url(base, css)).collect(),
          client_url: None,
          artifact: Some(artifact),
        };
        renderer.render(&context)
      }
      None => {
        warn!(
          template = %template.display(),
          reference = %occurrence.reference,
          "no bundle output for marker",
        );
        missing_artifact_placeholder(&occurrence.reference)
      }
    };

    output.push_str(&text[cursor..occurrence.start]);
    output.push_str(&replacement);
    cursor = occurrence.end;
  }

  output.push_str(&text[cursor..]);
  output
}
