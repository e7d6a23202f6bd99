//! Bundler lifecycle orchestration for the asset bridge.
//!
//! The bridge is invoked at four lifecycle points: [`AssetBridge::configure`]
//! before the bundler resolves its configuration,
//! [`AssetBridge::apply_resolved`] once it has,
//! [`AssetBridge::start_dev`] when the dev server comes up, and
//! [`AssetBridge::finish_build`] after bundling produced its artifact set.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::build;
use crate::config::BridgeConfig;
use crate::discovery::{self, IgnoreSet};
use crate::markers::MarkerPattern;
use crate::mirror;
use crate::models::{ArtifactManifest, EntryReference, ResolvedBundler};
use crate::paths;
use crate::render::{AssetRenderer, DefaultRenderer};
use crate::watch::{self, WatchCoordinator};

const DEFAULT_DEV_ORIGIN: &str = "http://localhost:5173";
const HOUSEKEEPING_DIRS: [&str; 2] = ["node_modules", ".git"];

/// Bundler inputs and watch exclusions produced by the configure hook.
#[derive(Debug, Clone, Default)]
pub struct ConfigureOutput {
  /// Absolute module paths to register as additional bundler inputs, in
  /// first-seen order without duplicates.
  pub inputs: Vec<PathBuf>,
  /// Directories the host's file watcher should exclude.
  pub watch_exclusions: Vec<PathBuf>,
}

/// Ties configuration, discovery, the rewrite engines and the mirrors into
/// the bundler's lifecycle.
pub struct AssetBridge {
  config: BridgeConfig,
  root: PathBuf,
  marker: MarkerPattern,
  renderer: Arc<dyn AssetRenderer + Send + Sync>,
  ignore: IgnoreSet,
  files: Vec<PathBuf>,
  entries: Vec<EntryReference>,
  resolved: ResolvedBundler,
}

impl AssetBridge {
  /// Create a bridge with the default renderer.
  pub fn new(project_dir: impl Into<PathBuf>, config: BridgeConfig) -> Result<Self> {
    Self::with_renderer(project_dir, config, DefaultRenderer)
  }

  /// Create a bridge with a caller-supplied renderer.
  pub fn with_renderer(
    project_dir: impl Into<PathBuf>,
    config: BridgeConfig,
    renderer: impl AssetRenderer + Send + Sync + 'static,
  ) -> Result<Self> {
    let project_dir = project_dir.into();
    let root = match &config.root {
      Some(root) => {
        let candidate = PathBuf::from(root);
        if candidate.is_absolute() { candidate } else { project_dir.join(candidate) }
      }
      None => project_dir,
    };

    let marker = match &config.marker_pattern {
      Some(pattern) => MarkerPattern::custom(pattern)?,
      None => MarkerPattern::default(),
    };

    Ok(Self {
      config,
      root,
      marker,
      renderer: Arc::new(renderer),
      ignore: IgnoreSet::default(),
      files: Vec::new(),
      entries: Vec::new(),
      resolved: ResolvedBundler::default(),
    })
  }

  /// Discover templates, scan them for markers and collect entry references.
  ///
  /// Returns the module paths the bundler should treat as additional inputs
  /// plus the directories its watcher must leave alone. Fails when
  /// `require_entry` is set and no marker exists in any template.
  pub fn configure(&mut self) -> Result<ConfigureOutput> {
    self.ignore = self.build_ignore_set();
    self.files = discovery::discover_templates(&self.root, &self.config.templates, &self.ignore)?;
    self.entries.clear();

    let mut inputs = Vec::new();
    let mut seen = BTreeSet::new();
    for template in &self.files {
      let text = fs::read_to_string(template)
        .with_context(|| format!("failed to read {}", template.display()))?;
      for occurrence in self.marker.scan(&text) {
        let module = self
          .root
          .join(paths::strip_leading_separator(&occurrence.reference));
        if seen.insert(paths::normalize_for_compare(&module)) {
          inputs.push(module.clone());
        }
        self.entries.push(EntryReference { template: template.clone(), module });
      }
    }

    if self.config.require_entry && self.entries.is_empty() {
      return Err(anyhow!(
        "no entry markers found in {} template file(s)",
        self.files.len()
      ));
    }

    info!(
      templates = self.files.len(),
      entries = self.entries.len(),
      "configured asset bridge"
    );
    Ok(ConfigureOutput {
      inputs,
      watch_exclusions: self.ignore.dirs().map(PathBuf::from).collect(),
    })
  }

  /// Snapshot the bundler's resolved configuration. The resolved output
  /// directory joins the ignore set so later discovery never reads it back.
  pub fn apply_resolved(&mut self, resolved: ResolvedBundler) {
    if let Some(out_dir) = &resolved.out_dir {
      self.ignore.insert(out_dir.clone());
    }
    self.resolved = resolved;
  }

  /// Perform the initial dev mirror pass and hand back the coordinator that
  /// keeps it in sync. The host attaches it to its watch events, either
  /// directly or through [`watch::spawn_watcher`].
  pub fn start_dev(&self) -> Result<WatchCoordinator> {
    let mut coordinator = WatchCoordinator {
      root: self.root.clone(),
      patterns: watch::compile_patterns(&self.config.templates)?,
      pattern_sources: self.config.templates.clone(),
      // Rebuilt rather than reused so the mirror directories are excluded
      // even when the host skips the configure hook in dev mode.
      ignore: self.build_ignore_set(),
      marker: self.marker.clone(),
      renderer: Arc::clone(&self.renderer),
      dev_out: self.dev_out(),
      dev_origin: self.dev_origin(),
      public_dir: self.resolved.public_dir.clone(),
      files: BTreeMap::new(),
      public_copies: BTreeSet::new(),
    };
    coordinator.rewrite_all()?;
    Ok(coordinator)
  }

  /// Rewrite and mirror every discovered template against the finished
  /// artifact manifest. Call after [`AssetBridge::configure`].
  pub fn finish_build(&self, manifest: &ArtifactManifest) -> Result<()> {
    let out_root = self.build_out();
    let base = self.public_base();

    for template in &self.files {
      let text = fs::read_to_string(template)
        .with_context(|| format!("failed to read {}", template.display()))?;
      if self.marker.contains_marker(&text) {
        let rewritten = build::rewrite_for_build(
          &text,
          template,
          &self.root,
          &base,
          manifest,
          &self.marker,
          self.renderer.as_ref(),
        );
        mirror::write_mirrored(&out_root, &self.root, template, &rewritten)?;
      } else {
        mirror::copy_mirrored(&out_root, &self.root, template)?;
      }
    }

    info!(
      templates = self.files.len(),
      out = %out_root.display(),
      "mirrored production templates"
    );
    Ok(())
  }

  /// The dev server origin: explicit config, then the resolved bundler
  /// origin, then the conventional localhost default.
  pub fn dev_origin(&self) -> String {
    self
      .config
      .dev_origin
      .clone()
      .or_else(|| self.resolved.dev_origin.clone())
      .unwrap_or_else(|| DEFAULT_DEV_ORIGIN.to_string())
  }

  /// The public base URL: explicit config, then the bundler's base, then `/`.
  pub fn public_base(&self) -> String {
    self
      .config
      .public_base
      .clone()
      .or_else(|| self.resolved.base.clone())
      .unwrap_or_else(|| "/".to_string())
  }

  /// Templates discovered by the last [`AssetBridge::configure`] call.
  pub fn templates(&self) -> &[PathBuf] {
    &self.files
  }

  /// Entry references collected by the last [`AssetBridge::configure`] call.
  pub fn entry_references(&self) -> &[EntryReference] {
    &self.entries
  }

  fn dev_out(&self) -> PathBuf {
    self.root.join(&self.config.dev_dir)
  }

  fn build_out(&self) -> PathBuf {
    self
      .resolved
      .out_dir
      .clone()
      .unwrap_or_else(|| self.root.join(&self.config.build_dir))
  }

  fn build_ignore_set(&self) -> IgnoreSet {
    let mut ignore = IgnoreSet::default();
    ignore.insert(self.dev_out());
    ignore.insert(self.root.join(&self.config.build_dir));
    if let Some(out_dir) = &self.resolved.out_dir {
      ignore.insert(out_dir.clone());
    }
    for dir in &self.config.extra_ignore_dirs {
      ignore.insert(self.root.join(dir));
    }
    for dir in HOUSEKEEPING_DIRS {
      ignore.insert(self.root.join(dir));
    }
    ignore
  }
}
