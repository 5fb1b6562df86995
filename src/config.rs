//! Configuration for patchup.
//!
//! Settings are stored in `~/.config/patchup/config.toml`. Every field is
//! optional; missing fields fall back to the built-in template defaults.

use crate::update::Bookmark;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Name of the directory created in the working tree for patch files
    pub patches_dir: String,
    /// Upstream paths never included in the diff
    pub ignored_paths: Vec<String>,
    /// Package manifest whose version-tracking lines are stripped from patches
    pub manifest_file: String,
    /// Manifest property that records the upstream commit a project is on
    pub tracking_key: String,
    /// Template repository used by `update`
    pub template_repo: String,
    /// Topic used to discover example repositories for `apply`
    pub example_topic: String,
    /// Where remote repositories are cached; defaults to the user cache dir
    pub cache_dir: Option<PathBuf>,
    /// Named upstream commits that close an update batch
    pub bookmarks: Vec<Bookmark>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patches_dir: "_patchup-patches".to_string(),
            ignored_paths: [
                "node_modules/**",
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "dist/**",
                ".git/**",
                "coverage/**",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            manifest_file: "package.json".to_string(),
            tracking_key: "epic-stack".to_string(),
            template_repo: "https://github.com/epicweb-dev/epic-stack.git".to_string(),
            example_topic: "epic-stack-example".to_string(),
            cache_dir: None,
            bookmarks: crate::update::default_bookmarks(),
        }
    }
}

impl Config {
    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::git::default_cache_root)
    }
}

/// Returns the path to the config file: `~/.config/patchup/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("patchup").join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
/// Returns defaults if the file is missing or invalid.
pub fn load(path: Option<&Path>) -> Config {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        return Config::default();
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => parse(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring invalid config");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

fn parse(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}
