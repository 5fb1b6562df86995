use crate::error::Error;
use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use git2::{
    Commit, DiffDelta, DiffFindOptions, DiffFormat, DiffOptions, Oid, Repository as Git2Repo,
    Sort, StatusOptions,
};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// One point in the upstream history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub hash: String,
    /// Commit time as RFC 3339
    pub date: String,
    pub message: String,
}

impl CommitRef {
    fn from_commit(commit: &Commit) -> Self {
        let date = DateTime::from_timestamp(commit.time().seconds(), 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        Self {
            hash: commit.id().to_string(),
            date,
            message: commit.summary().unwrap_or_default().to_string(),
        }
    }

    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

pub struct Repository {
    repo: Git2Repo,
}

impl From<Git2Repo> for Repository {
    fn from(repo: Git2Repo) -> Self {
        Self { repo }
    }
}

impl Repository {
    /// Open a repository at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::open(path).context("Failed to open repository")?;
        Ok(Self { repo })
    }

    /// Resolve a ref name or (abbreviated) commit hash to a commit OID
    pub fn resolve_ref(&self, ref_name: &str) -> Result<Oid> {
        // Try as a branch name
        if let Ok(branch) = self.repo.find_branch(ref_name, git2::BranchType::Local) {
            if let Some(reference) = branch.get().target() {
                return Ok(reference);
            }
        }

        // Try as a remote branch
        let remote_ref = format!("origin/{}", ref_name);
        if let Ok(branch) = self.repo.find_branch(&remote_ref, git2::BranchType::Remote) {
            if let Some(reference) = branch.get().target() {
                return Ok(reference);
            }
        }

        // Try revparse as last resort
        let obj = self
            .repo
            .revparse_single(ref_name)
            .context(format!("Could not resolve ref: {}", ref_name))?;
        let commit = obj
            .peel_to_commit()
            .context(format!("{} does not point at a commit", ref_name))?;

        Ok(commit.id())
    }

    /// Get the HEAD commit OID
    pub fn head_commit(&self) -> Result<Oid> {
        let head = self.repo.head().context("Failed to get HEAD")?;
        head.target().ok_or_else(|| anyhow!("HEAD has no target"))
    }

    /// List the commits after `base` (exclusive) up to `head`, oldest first.
    ///
    /// Without a base the whole history reachable from `head` is returned;
    /// without a head, `HEAD` is used.
    pub fn commit_range(&self, base: Option<&str>, head: Option<&str>) -> Result<Vec<CommitRef>> {
        let head_oid = match head {
            Some(head) => self.resolve_ref(head)?,
            None => self.head_commit()?,
        };

        let mut walk = self.repo.revwalk().context("Failed to walk history")?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(head_oid)?;

        if let Some(base) = base {
            let base_oid = self
                .resolve_ref(base)
                .map_err(|_| Error::BaseNotFound(base.to_string()))?;
            walk.hide(base_oid)?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitRef::from_commit(&commit));
        }

        if commits.is_empty() {
            return Err(Error::NoCommits.into());
        }
        Ok(commits)
    }

    /// Render the changes introduced by `first..=last` as unified diff text.
    ///
    /// The diff starts at the parent of `first` (or the empty tree for a root
    /// commit), so the first commit's own changes are included. Files whose
    /// path matches one of `ignored` are left out.
    pub fn diff_range(&self, first: &str, last: &str, ignored: &[String]) -> Result<String> {
        let first_commit = self
            .repo
            .find_commit(self.resolve_ref(first)?)
            .context("Failed to find base commit")?;
        let last_commit = self
            .repo
            .find_commit(self.resolve_ref(last)?)
            .context("Failed to find head commit")?;

        let base_tree = match first_commit.parent(0) {
            Ok(parent) => Some(parent.tree().context("Failed to get base commit tree")?),
            Err(_) => None,
        };
        let head_tree = last_commit
            .tree()
            .context("Failed to get head commit tree")?;

        let mut opts = DiffOptions::new();
        opts.context_lines(3);

        let mut diff = self
            .repo
            .diff_tree_to_tree(base_tree.as_ref(), Some(&head_tree), Some(&mut opts))
            .context("Failed to compute diff")?;

        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))
            .context("Failed to detect renames")?;

        let ignore = build_ignore_set(ignored)?;
        let mut out = Vec::new();
        diff.print(DiffFormat::Patch, |delta, _hunk, line| {
            if is_ignored(&ignore, &delta) {
                return true;
            }
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin() as u8);
            }
            out.extend_from_slice(line.content());
            true
        })
        .context("Failed to render diff")?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Whether the git working tree containing `dir` has no uncommitted changes.
///
/// Untracked files count as changes. If the status cannot be read (not a git
/// repository, for instance) the tree is treated as clean.
pub fn working_tree_is_clean(dir: &Path) -> bool {
    let check = || -> Result<bool> {
        let repo = Git2Repo::discover(dir)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    };

    match check() {
        Ok(clean) => clean,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "could not check git working tree");
            true
        }
    }
}

fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid ignore pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_ignored(ignore: &GlobSet, delta: &DiffDelta) -> bool {
    [delta.new_file().path(), delta.old_file().path()]
        .into_iter()
        .flatten()
        .any(|path| {
            let hit = ignore.is_match(path);
            if hit {
                debug!(path = %path.display(), "ignored upstream path");
            }
            hit
        })
}
