//! Watch event handling keeping the dev mirror in sync with source changes.
//!
//! The coordinator itself is synchronous and transport-free: the host (or the
//! bundled notify adapter) maps raw file system events into the closed
//! [`WatchEvent`] set and drives [`WatchCoordinator::handle_event`] one event
//! at a time. Within one event, mirror writes always complete before the
//! reload broadcast, so a reloading client never fetches a stale mirror.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use glob::Pattern;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::dev;
use crate::discovery::{self, IgnoreSet};
use crate::markers::MarkerPattern;
use crate::mirror;
use crate::paths;
use crate::render::AssetRenderer;

/// Capability to tell connected dev clients to reload everything.
pub trait ReloadTransport {
    /// Broadcast a full-page reload to every connected client.
    fn reload_all(&self);
}

/// Closed set of events the coordinator reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file matching the template patterns appeared.
    TemplateAdded(PathBuf),
    /// A tracked template file disappeared.
    TemplateRemoved(PathBuf),
    /// A file changed; membership in the tracked set is checked on handling.
    TemplateChanged(PathBuf),
    /// A file inside the public asset directory changed.
    PublicAssetChanged(PathBuf),
}

/// Raw change kinds the adapter distinguishes before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A file came into existence.
    Create,
    /// A file's content changed.
    Modify,
    /// A file went away.
    Remove,
}

/// Reacts to file events by re-running discovery and the dev rewrite engine,
/// keeping the dev mirror congruent with the source tree.
pub struct WatchCoordinator {
    pub(crate) root: PathBuf,
    pub(crate) pattern_sources: Vec<String>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) ignore: IgnoreSet,
    pub(crate) marker: MarkerPattern,
    pub(crate) renderer: Arc<dyn AssetRenderer + Send + Sync>,
    pub(crate) dev_out: PathBuf,
    pub(crate) dev_origin: String,
    pub(crate) public_dir: Option<PathBuf>,
    /// Tracked template files keyed by canonical comparison form.
    pub(crate) files: BTreeMap<String, PathBuf>,
    /// Mirror-relative paths of public assets copied so far; kept out of
    /// pruning so asset copies survive template resyncs.
    pub(crate) public_copies: BTreeSet<PathBuf>,
}

impl WatchCoordinator {
    /// The template files currently tracked, in their on-disk spelling.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.values().map(PathBuf::as_path)
    }

    /// Re-run discovery, rewrite the whole current file set into the dev
    /// mirror and prune mirrored files whose source vanished.
    pub fn rewrite_all(&mut self) -> Result<()> {
        let discovered =
            discovery::discover_templates(&self.root, &self.pattern_sources, &self.ignore)?;
        self.files = discovered
            .into_iter()
            .map(|path| (paths::normalize_for_compare(&path), path))
            .collect();

        let mut keep = self.public_copies.clone();
        for template in self.files.values() {
            keep.insert(mirror::mirror_relative(&self.root, template));
            self.rewrite_one(template)?;
        }
        mirror::prune_stale(&self.dev_out, &keep)
            .with_context(|| format!("failed to prune {}", self.dev_out.display()))?;

        info!(templates = self.files.len(), "refreshed dev mirror");
        Ok(())
    }

    /// Dispatch one watch event. Mirror writes finish before the reload
    /// signal is sent.
    pub fn handle_event(
        &mut self,
        event: WatchEvent,
        transport: &dyn ReloadTransport,
    ) -> Result<()> {
        match event {
            WatchEvent::TemplateAdded(path) | WatchEvent::TemplateRemoved(path) => {
                debug!(path = %path.display(), "template set membership changed");
                self.rewrite_all()?;
                transport.reload_all();
            }
            WatchEvent::TemplateChanged(path) => {
                let Some(template) = self.files.get(&paths::normalize_for_compare(&path)).cloned()
                else {
                    debug!(path = %path.display(), "ignoring change to untracked file");
                    return Ok(());
                };
                self.rewrite_one(&template)?;
                transport.reload_all();
            }
            WatchEvent::PublicAssetChanged(path) => {
                if self.copy_public_asset(&path)? {
                    transport.reload_all();
                }
            }
        }
        Ok(())
    }

    /// Map a raw change on `path` into the closed event set, or `None` when
    /// the event is irrelevant (ignored directory, untracked removal, file
    /// not matching any template pattern).
    pub fn classify(&self, kind: WatchEventKind, path: &Path) -> Option<WatchEvent> {
        if self.ignore.is_ignored(path) {
            return None;
        }

        if let Some(public_dir) = &self.public_dir
            && kind != WatchEventKind::Remove
            && paths::is_under(public_dir, path)
        {
            return Some(WatchEvent::PublicAssetChanged(path.to_path_buf()));
        }

        match kind {
            WatchEventKind::Create => self
                .matches_template(path)
                .then(|| WatchEvent::TemplateAdded(path.to_path_buf())),
            WatchEventKind::Remove => self
                .files
                .contains_key(&paths::normalize_for_compare(path))
                .then(|| WatchEvent::TemplateRemoved(path.to_path_buf())),
            WatchEventKind::Modify => Some(WatchEvent::TemplateChanged(path.to_path_buf())),
        }
    }

    fn matches_template(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.patterns.iter().any(|pattern| pattern.matches_path(relative))
    }

    fn rewrite_one(&self, template: &Path) -> Result<()> {
        // Content is read fresh on every rewrite, never cached across writes.
        let text = fs::read_to_string(template)
            .with_context(|| format!("failed to read {}", template.display()))?;

        if self.marker.contains_marker(&text) {
            let rewritten = dev::rewrite_for_dev(
                &text,
                template,
                &self.root,
                &self.dev_origin,
                &self.marker,
                self.renderer.as_ref(),
            );
            mirror::write_mirrored(&self.dev_out, &self.root, template, &rewritten)?;
        } else {
            mirror::copy_mirrored(&self.dev_out, &self.root, template)?;
        }
        Ok(())
    }

    fn copy_public_asset(&mut self, path: &Path) -> Result<bool> {
        let Some(public_dir) = &self.public_dir else {
            return Ok(false);
        };
        let Ok(relative) = path.strip_prefix(public_dir) else {
            warn!(path = %path.display(), "asset event outside the public directory");
            return Ok(false);
        };

        let target = self.dev_out.join(relative);
        mirror::copy_verbatim(path, &target)?;
        self.public_copies.insert(relative.to_path_buf());
        debug!(target = %target.display(), "copied public asset into dev mirror");
        Ok(true)
    }
}

/// Compile template glob patterns for single-path membership matching.
pub(crate) fn compile_patterns(sources: &[String]) -> Result<Vec<Pattern>> {
    sources
        .iter()
        .map(|source| {
            Pattern::new(source).with_context(|| format!("invalid template pattern `{source}`"))
        })
        .collect()
}

/// Map a raw notify event kind into the closed set, dropping directory and
/// metadata-only noise.
pub fn classify_notify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(CreateKind::File) => Some(WatchEventKind::Create),
        EventKind::Modify(ModifyKind::Data(_)) => Some(WatchEventKind::Modify),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchEventKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchEventKind::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(WatchEventKind::Modify),
        EventKind::Remove(RemoveKind::File) => Some(WatchEventKind::Remove),
        _ => None,
    }
}

/// Handle keeping the OS watcher and its event thread alive.
pub struct WatcherHandle {
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop watching and wait for the event thread to drain.
    pub fn stop(self) {
        drop(self.watcher);
        let _ = self.thread.join();
    }
}

/// Watch the coordinator's root (and an out-of-root public directory, when
/// configured) recursively, driving the coordinator from a dedicated thread.
///
/// Events are processed strictly one at a time; a handler runs to completion
/// before the next queued event is taken.
pub fn spawn_watcher(
    mut coordinator: WatchCoordinator,
    transport: impl ReloadTransport + Send + 'static,
) -> Result<WatcherHandle> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        let _ = tx.send(result);
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&coordinator.root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", coordinator.root.display()))?;
    info!(root = %coordinator.root.display(), "watching template root");

    if let Some(public_dir) = coordinator.public_dir.clone()
        && !paths::is_under(&coordinator.root, &public_dir)
        && public_dir.is_dir()
    {
        watcher
            .watch(&public_dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", public_dir.display()))?;
        info!(root = %public_dir.display(), "watching public asset directory");
    }

    let thread = std::thread::spawn(move || {
        for result in rx {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    error!(error = %err, "watch error");
                    continue;
                }
            };
            let Some(kind) = classify_notify(&event.kind) else {
                continue;
            };
            for path in &event.paths {
                let Some(classified) = coordinator.classify(kind, path) else {
                    continue;
                };
                if let Err(err) = coordinator.handle_event(classified, &transport) {
                    error!(error = %err, path = %path.display(), "failed to process watch event");
                }
            }
        }
    });

    Ok(WatcherHandle { watcher, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DefaultRenderer;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Records, at each reload, the content of one probed mirror file. Lets
    /// tests assert the write-before-reload ordering.
    struct ProbeTransport {
        probe: PathBuf,
        snapshots: RefCell<Vec<String>>,
    }

    impl ProbeTransport {
        fn new(probe: PathBuf) -> Self {
            Self { probe, snapshots: RefCell::new(Vec::new()) }
        }
    }

    impl ReloadTransport for ProbeTransport {
        fn reload_all(&self) {
            let content = fs::read_to_string(&self.probe).unwrap_or_default();
            self.snapshots.borrow_mut().push(content);
        }
    }

    fn coordinator(root: &Path, public_dir: Option<PathBuf>) -> WatchCoordinator {
        let sources = vec!["**/*.ascx".to_string()];
        let mut ignore = IgnoreSet::default();
        ignore.insert(root.join("dev"));
        WatchCoordinator {
            root: root.to_path_buf(),
            patterns: compile_patterns(&sources).unwrap(),
            pattern_sources: sources,
            ignore,
            marker: MarkerPattern::default(),
            renderer: Arc::new(DefaultRenderer),
            dev_out: root.join("dev"),
            dev_origin: "http://localhost:5173".into(),
            public_dir,
            files: BTreeMap::new(),
            public_copies: BTreeSet::new(),
        }
    }

    #[test]
    fn changed_templates_are_rewritten_before_the_reload_signal() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let template = root.join("home.ascx");
        fs::write(&template, "<!-- @vite:entry src/home.js -->").unwrap();

        let mut coordinator = coordinator(root, None);
        coordinator.rewrite_all().unwrap();

        fs::write(&template, "<!-- @vite:entry src/other.js -->").unwrap();
        let transport = ProbeTransport::new(root.join("dev/home.ascx"));
        coordinator
            .handle_event(WatchEvent::TemplateChanged(template), &transport)
            .unwrap();

        let snapshots = transport.snapshots.into_inner();
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].contains("http://localhost:5173/src/other.js"));
    }

    #[test]
    fn changes_to_untracked_files_are_ignored() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("notes.txt"), "scratch").unwrap();

        let mut coordinator = coordinator(root, None);
        coordinator.rewrite_all().unwrap();

        let transport = ProbeTransport::new(root.join("dev/notes.txt"));
        coordinator
            .handle_event(WatchEvent::TemplateChanged(root.join("notes.txt")), &transport)
            .unwrap();
        assert!(transport.snapshots.into_inner().is_empty());
    }

    #[test]
    fn additions_resync_the_whole_set_and_removals_prune_the_mirror() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("first.ascx"), "plain").unwrap();

        let mut coordinator = coordinator(root, None);
        coordinator.rewrite_all().unwrap();
        assert!(root.join("dev/first.ascx").exists());

        fs::write(root.join("second.ascx"), "<!-- @vite:entry src/b.js -->").unwrap();
        let transport = ProbeTransport::new(root.join("dev/second.ascx"));
        coordinator
            .handle_event(
                WatchEvent::TemplateAdded(root.join("second.ascx")),
                &transport,
            )
            .unwrap();
        assert!(root.join("dev/second.ascx").exists());
        assert_eq!(transport.snapshots.into_inner().len(), 1);

        fs::remove_file(root.join("first.ascx")).unwrap();
        let transport = ProbeTransport::new(root.join("dev/first.ascx"));
        coordinator
            .handle_event(
                WatchEvent::TemplateRemoved(root.join("first.ascx")),
                &transport,
            )
            .unwrap();
        assert!(!root.join("dev/first.ascx").exists());
        assert!(root.join("dev/second.ascx").exists());
    }

    #[test]
    fn public_assets_copy_with_the_prefix_stripped_and_survive_resyncs() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("public/img")).unwrap();
        fs::write(root.join("public/img/logo.png"), "png").unwrap();
        fs::write(root.join("home.ascx"), "plain").unwrap();

        let mut coordinator = coordinator(root, Some(root.join("public")));
        coordinator.rewrite_all().unwrap();

        let transport = ProbeTransport::new(root.join("dev/img/logo.png"));
        coordinator
            .handle_event(
                WatchEvent::PublicAssetChanged(root.join("public/img/logo.png")),
                &transport,
            )
            .unwrap();
        assert_eq!(transport.snapshots.into_inner(), vec!["png".to_string()]);

        coordinator.rewrite_all().unwrap();
        assert!(root.join("dev/img/logo.png").exists());
    }

    #[test]
    fn classification_respects_ignores_patterns_and_membership() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("home.ascx"), "plain").unwrap();

        let mut coordinator = coordinator(root, Some(root.join("public")));
        coordinator.rewrite_all().unwrap();

        assert!(coordinator
            .classify(WatchEventKind::Modify, &root.join("dev/home.ascx"))
            .is_none());
        assert_eq!(
            coordinator.classify(WatchEventKind::Create, &root.join("new.ascx")),
            Some(WatchEvent::TemplateAdded(root.join("new.ascx"))),
        );
        assert!(coordinator
            .classify(WatchEventKind::Create, &root.join("new.txt"))
            .is_none());
        assert_eq!(
            coordinator.classify(WatchEventKind::Remove, &root.join("home.ascx")),
            Some(WatchEvent::TemplateRemoved(root.join("home.ascx"))),
        );
        assert!(coordinator
            .classify(WatchEventKind::Remove, &root.join("never-seen.ascx"))
            .is_none());
        assert_eq!(
            coordinator.classify(WatchEventKind::Create, &root.join("public/logo.png")),
            Some(WatchEvent::PublicAssetChanged(root.join("public/logo.png"))),
        );
    }

    #[test]
    fn notify_kinds_map_into_the_closed_set() {
        assert_eq!(
            classify_notify(&EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Create),
        );
        assert_eq!(
            classify_notify(&EventKind::Remove(RemoveKind::File)),
            Some(WatchEventKind::Remove),
        );
        assert_eq!(
            classify_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(WatchEventKind::Create),
        );
        assert!(classify_notify(&EventKind::Create(CreateKind::Folder)).is_none());
    }
}
