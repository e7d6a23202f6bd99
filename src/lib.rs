#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod bridge;
pub mod build;
pub mod config;
pub mod dev;
pub mod discovery;
pub mod markers;
pub mod mirror;
pub mod models;
pub mod paths;
pub mod render;
pub mod watch;

pub use bridge::{AssetBridge, ConfigureOutput};
pub use config::BridgeConfig;
pub use discovery::IgnoreSet;
pub use markers::{MarkerMatch, MarkerPattern};
pub use models::{Artifact, ArtifactManifest, EntryReference, Mode, RenderContext, ResolvedBundler};
pub use render::{AssetRenderer, DefaultRenderer};
pub use watch::{ReloadTransport, WatchCoordinator, WatchEvent, WatcherHandle};
