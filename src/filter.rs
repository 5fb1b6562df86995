//! Narrowing the set of upstream changes by path.
//!
//! Three tiers are checked in order: explicitly requested files always win,
//! exclude patterns prune everything else, and include patterns narrow what
//! remains.

use crate::git::FileChange;
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

/// One include or exclude entry
#[derive(Debug, Clone)]
enum Pattern {
    /// Entry containing `*`, matched against the whole path
    Glob(GlobMatcher),
    /// Entry containing `*` that failed to compile; never matches
    Invalid,
    /// Plain entry, matched as a substring of the path
    Substring(String),
}

impl Pattern {
    fn new(raw: &str) -> Self {
        if !raw.contains('*') {
            return Pattern::Substring(raw.to_string());
        }
        match GlobBuilder::new(raw).literal_separator(true).build() {
            Ok(glob) => Pattern::Glob(glob.compile_matcher()),
            Err(err) => {
                warn!(pattern = raw, error = %err, "invalid glob pattern, it will never match");
                Pattern::Invalid
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Glob(glob) => glob.is_match(path),
            Pattern::Invalid => false,
            Pattern::Substring(needle) => path.contains(needle.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    exact_files: Vec<String>,
    includes: Vec<String>,
    excludes: Vec<String>,
    include_patterns: Vec<Pattern>,
    exclude_patterns: Vec<Pattern>,
}

impl ChangeFilter {
    pub fn new(exact_files: Vec<String>, includes: Vec<String>, excludes: Vec<String>) -> Self {
        let exact_files = exact_files
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| normalize_path(f))
            .collect();
        let include_patterns = includes.iter().map(|p| Pattern::new(p)).collect();
        let exclude_patterns = excludes.iter().map(|p| Pattern::new(p)).collect();

        Self {
            exact_files,
            includes,
            excludes,
            include_patterns,
            exclude_patterns,
        }
    }

    /// True when no rule was supplied and every change passes
    pub fn is_empty(&self) -> bool {
        self.exact_files.is_empty() && self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn exact_files(&self) -> &[String] {
        &self.exact_files
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Decide whether a single change passes the filter
    pub fn matches(&self, change: &FileChange) -> bool {
        if self.is_empty() {
            return true;
        }

        let path = normalize_path(&change.path);

        let exact = self.exact_files.iter().any(|entry| {
            path.ends_with(entry.as_str())
                || change
                    .old_path
                    .as_deref()
                    .is_some_and(|old| normalize_path(old) == *entry)
        });
        if exact {
            debug!(path = %path, kind = change.kind.as_str(), "included by explicit file");
            return true;
        }

        if self.exclude_patterns.iter().any(|p| p.matches(&path)) {
            debug!(path = %path, kind = change.kind.as_str(), "excluded by ignore pattern");
            return false;
        }

        if self.include_patterns.is_empty() {
            return true;
        }
        self.include_patterns.iter().any(|p| p.matches(&path))
    }

    /// Keep the changes that pass the filter, in their original order
    pub fn apply(&self, changes: Vec<FileChange>) -> Vec<FileChange> {
        if self.is_empty() {
            return changes;
        }
        changes.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Lexically normalize a `/`-separated path: drop empty and `.` segments and
/// fold `..` into its parent where possible.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(&last) if last != "..") {
                    parts.pop();
                } else if !path.starts_with('/') {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
