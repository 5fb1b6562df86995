//! Locating and caching the upstream template repository.

use super::repository::Repository;
use crate::error::Error;
use crate::report::{Reporter, Tone};
use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::Repository as Git2Repo;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the upstream repository lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    /// A repository already on disk
    Local(PathBuf),
    /// A clone URL
    Remote(String),
}

impl RepoSource {
    /// Interpret a repository argument.
    ///
    /// Accepts a clone URL, an existing local directory, or a GitHub
    /// `organization/repo` shorthand.
    pub fn parse(input: &str) -> Result<Self, Error> {
        const URL_PREFIXES: [&str; 5] = ["http://", "https://", "ssh://", "git@", "file://"];
        if URL_PREFIXES.iter().any(|p| input.starts_with(p)) {
            return Ok(RepoSource::Remote(input.to_string()));
        }

        if Path::new(input).exists() {
            return Ok(RepoSource::Local(PathBuf::from(input)));
        }

        let parts: Vec<&str> = input.split('/').collect();
        if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
            return Ok(RepoSource::Remote(format!("https://github.com/{input}.git")));
        }

        Err(Error::UnresolvableRepo(input.to_string()))
    }
}

impl fmt::Display for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoSource::Local(path) => write!(f, "{}", path.display()),
            RepoSource::Remote(url) => f.write_str(url),
        }
    }
}

/// Cache root used when the config does not name one
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("patchup")
}

/// Directory a remote URL is cached under
pub fn cache_path(cache_root: &Path, url: &str) -> PathBuf {
    let name: String = url
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cache_root.join(name)
}

/// Open the upstream repository, cloning or refreshing a cached bare copy
/// for remote sources.
pub fn acquire<W: Write>(
    source: &RepoSource,
    cache_root: &Path,
    reporter: &mut Reporter<W>,
) -> Result<Repository> {
    let url = match source {
        RepoSource::Local(path) => return Repository::open(path),
        RepoSource::Remote(url) => url,
    };

    let path = cache_path(cache_root, url);
    if path.exists() {
        info!(url, path = %path.display(), "refreshing cached upstream");
        let repo = Git2Repo::open_bare(&path).context("Failed to open cached repository")?;
        repo.find_remote("origin")
            .and_then(|mut remote| remote.fetch(&["+refs/heads/*:refs/heads/*"], None, None))
            .with_context(|| format!("Failed to fetch {url}"))?;
        return Ok(Repository::from(repo));
    }

    let location = reporter.paint(&path.display().to_string(), Tone::Dim);
    reporter.line(format!("⬇️  Cloning {url} into a cache directory: {location}"));
    std::fs::create_dir_all(cache_root)
        .with_context(|| format!("Failed to create {}", cache_root.display()))?;
    let repo = RepoBuilder::new()
        .bare(true)
        .clone(url, &path)
        .with_context(|| format!("Failed to clone {url}"))?;
    Ok(Repository::from(repo))
}
