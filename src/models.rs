//! Value types shared between the rewrite engines and the bundler hooks.

use std::path::{Path, PathBuf};

use crate::paths;

/// Rewrite mode a render context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Markers point at a live module server.
  Dev,
  /// Markers point at hashed bundler artifacts.
  Build,
}

/// Pairing of a template file and the absolute module path named by one of
/// its markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReference {
  /// Template file the marker was found in.
  pub template: PathBuf,
  /// Absolute path of the module the marker names.
  pub module: PathBuf,
}

/// A bundler-produced output file with its content-hashed final name.
#[derive(Debug, Clone, Default)]
pub struct Artifact {
  /// Whether the artifact is an entry chunk.
  pub is_entry: bool,
  /// Absolute path of the module the artifact was built from, when known.
  pub source_module: Option<PathBuf>,
  /// Final hashed file name relative to the bundler output directory.
  pub file_name: String,
  /// Stylesheet file names the bundler recorded for this artifact.
  pub css: Vec<String>,
}

/// Finished artifact set handed to the build rewrite pass.
#[derive(Debug, Clone, Default)]
pub struct ArtifactManifest {
  /// Every artifact the bundler produced, in emission order.
  pub artifacts: Vec<Artifact>,
}

impl ArtifactManifest {
  /// Locate the entry artifact whose originating module matches `module` by
  /// canonical absolute-path equality.
  pub fn entry_for_module(&self, module: &Path) -> Option<&Artifact> {
    let wanted = paths::normalize_for_compare(module);
    self.artifacts.iter().find(|artifact| {
      artifact.is_entry
        && artifact
          .source_module
          .as_deref()
          .is_some_and(|source| paths::normalize_for_compare(source) == wanted)
    })
  }
}

/// Snapshot of the bundler configuration taken once it has been resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBundler {
  /// Output directory the bundler writes artifacts to.
  pub out_dir: Option<PathBuf>,
  /// Base URL the bundler serves artifacts under.
  pub base: Option<String>,
  /// Directory of static assets served as-is during development.
  pub public_dir: Option<PathBuf>,
  /// Origin of the development module server.
  pub dev_origin: Option<String>,
}

/// Data handed to the renderer describing one resolved marker.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
  /// Which pipeline the marker is being rewritten for.
  pub mode: Mode,
  /// Template file owning the marker occurrence.
  pub template: &'a Path,
  /// Raw reference text captured from the marker.
  pub reference: &'a str,
  /// Absolute module path the reference resolves to.
  pub module: PathBuf,
  /// Resolved JavaScript URL for the entry.
  pub js_url: String,
  /// Stylesheet URLs in recorded order; empty in dev mode.
  pub css_urls: Vec<String>,
  /// Live-reload client URL; present only for the first occurrence of a file
  /// in dev mode.
  pub client_url: Option<String>,
  /// Resolved bundler artifact; present only in build mode.
  pub artifact: Option<&'a Artifact>,
}
