//! Bridge configuration describing template discovery and output layout.

use std::fs;
use std::path::Path;

use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "bridge.config.json";

/// Discoverable configuration for the asset bridge.
///
/// Every field has a default so a missing or partial configuration file still
/// yields a working setup. The renderer is not part of the serialized
/// surface; custom renderers are supplied in code when constructing the
/// bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Glob patterns selecting template files, relative to the root.
    pub templates: Vec<String>,
    /// Directory name receiving the live development mirror.
    pub dev_dir: String,
    /// Directory name receiving the production mirror when the bundler does
    /// not supply an output directory.
    pub build_dir: String,
    /// Custom marker pattern; capture group 1 must hold the entry reference.
    pub marker_pattern: Option<String>,
    /// Public base URL prefixed to hashed artifact names in build mode.
    pub public_base: Option<String>,
    /// Explicit dev server origin, overriding the resolved one.
    pub dev_origin: Option<String>,
    /// Root directory templates mirror relative to; defaults to the project
    /// directory the bridge is constructed with.
    pub root: Option<String>,
    /// Fail the configure step when no marker exists in any template.
    pub require_entry: bool,
    /// Additional directories excluded from discovery and watching.
    pub extra_ignore_dirs: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            templates: vec!["**/*.ascx".into()],
            dev_dir: "dev".into(),
            build_dir: "dist".into(),
            marker_pattern: None,
            public_base: None,
            dev_origin: None,
            root: None,
            require_entry: false,
            extra_ignore_dirs: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// When the configuration file does not exist or fails to parse we fall
    /// back to default values so downstream callers can continue operating
    /// with sensible assumptions.
    pub fn discover(project_dir: &Path) -> Self {
        let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_cover_every_field() {
        let config = BridgeConfig::default();
        assert_eq!(config.templates, vec!["**/*.ascx".to_string()]);
        assert_eq!(config.dev_dir, "dev");
        assert_eq!(config.build_dir, "dist");
        assert!(config.marker_pattern.is_none());
        assert!(!config.require_entry);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bridge.config.json");
        fs::write(
            &path,
            r#"{ "templates": ["skins/**/*.ascx"], "publicBase": "/Portals/_default/Skins/MySkin/", "requireEntry": true }"#,
        )
        .unwrap();

        let config = BridgeConfig::from_path(&path).unwrap();
        assert_eq!(config.templates, vec!["skins/**/*.ascx".to_string()]);
        assert_eq!(
            config.public_base.as_deref(),
            Some("/Portals/_default/Skins/MySkin/")
        );
        assert!(config.require_entry);
        assert_eq!(config.dev_dir, "dev");
    }

    #[test]
    fn discover_falls_back_to_defaults_when_nothing_is_present() {
        let temp = tempdir().unwrap();
        let config = BridgeConfig::discover(temp.path());
        assert_eq!(config.build_dir, "dist");
    }
}
