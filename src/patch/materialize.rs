//! Carrying out a [`Plan`]: writing new files, deleting removed ones and
//! writing patch files for everything that needs a manual merge.
//!
//! Each file is handled independently; a failure is reported and counted
//! and the remaining files are still processed. With `dry_run` set the same
//! report is printed but nothing on disk is touched.

use super::resolve::{added_file_content, is_image, patch_file_name, target_exists, ManifestRule, Plan};
use crate::git::{ChangeKind, FileChange};
use crate::report::{Reporter, Tone};
use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub message: String,
}

/// What a materialization pass did, or would do in a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    /// Count printed under `Adding`
    pub added: usize,
    /// Count printed under `Deleting`
    pub deleted: usize,
    /// Count printed under `Modifying`
    pub modified: usize,
    /// Files written into the working tree
    pub created_files: Vec<String>,
    /// Files removed from the working tree
    pub removed_files: Vec<String>,
    /// Patch file names written into the patches directory
    pub patches: Vec<String>,
    /// Added files turned into patches because they already existed
    pub redirected: Vec<String>,
    /// Files that got no patch (images, tracking-only manifest changes)
    pub skipped: Vec<String>,
    pub failures: Vec<FileFailure>,
}

/// Hook run once a real pass has finished
pub type CompletionHook<'a> = &'a mut dyn FnMut() -> Result<()>;

pub struct Materializer<'a, W: Write> {
    working_dir: &'a Path,
    patches_dir: &'a Path,
    manifest: &'a ManifestRule,
    reporter: &'a mut Reporter<W>,
}

impl<'a, W: Write> Materializer<'a, W> {
    pub fn new(
        working_dir: &'a Path,
        patches_dir: &'a Path,
        manifest: &'a ManifestRule,
        reporter: &'a mut Reporter<W>,
    ) -> Self {
        Self {
            working_dir,
            patches_dir,
            manifest,
            reporter,
        }
    }

    /// Process additions, then deletions, then modifications.
    ///
    /// Only an error from `on_complete` is returned; per-file failures end up
    /// in the summary.
    pub fn run(
        &mut self,
        plan: &Plan<'_>,
        dry_run: bool,
        on_complete: Option<CompletionHook<'_>>,
    ) -> Result<MaterializeSummary> {
        info!(dry_run, "materializing changes");
        let mut summary = MaterializeSummary::default();
        let mut redirected: Vec<&FileChange> = plan.redirected.clone();

        summary.added = plan.create.len();
        self.reporter.header("Adding", summary.added, Tone::Green);
        for &change in &plan.create {
            self.reporter.entry(change, change.kind.code());
            if dry_run {
                continue;
            }

            let target = self.working_dir.join(&change.path);
            if target_exists(&target) {
                debug!(path = %change.path, "file appeared before write, redirecting to patch");
                redirected.push(change);
                continue;
            }
            match write_new_file(&target, change) {
                Ok(()) => summary.created_files.push(change.path.clone()),
                Err(err) => self.fail(&mut summary, change, "create", &err),
            }
        }

        summary.deleted = plan.delete.len();
        self.reporter.header("Deleting", summary.deleted, Tone::Red);
        for &change in &plan.delete {
            self.reporter.entry(change, change.kind.code());
            if dry_run {
                continue;
            }

            match remove_target(&self.working_dir.join(&change.path)) {
                Ok(true) => summary.removed_files.push(change.path.clone()),
                Ok(false) => debug!(path = %change.path, "deleted file is already gone"),
                Err(err) => self.fail(&mut summary, change, "delete", &err),
            }
        }

        summary.modified = plan.patch.len() + redirected.len();
        self.reporter.header("Modifying", summary.modified, Tone::Cyan);
        for &change in &plan.patch {
            self.reporter.entry(change, change.kind.code());
            if !dry_run {
                self.patch(change, false, &mut summary);
            }
        }
        for &change in &redirected {
            self.reporter.entry(change, ChangeKind::Modified.code());
            if !dry_run {
                summary.redirected.push(change.path.clone());
                self.patch(change, true, &mut summary);
            }
        }

        if !dry_run {
            if let Some(hook) = on_complete {
                hook()?;
            }
        }

        Ok(summary)
    }

    /// Write the patch file for one change, unless it is an image or a
    /// manifest change that only touches version tracking.
    fn patch(&mut self, change: &FileChange, redirected: bool, summary: &mut MaterializeSummary) {
        if is_image(&change.path) {
            self.reporter.note("Skipping patch for image file");
            summary.skipped.push(change.path.clone());
            return;
        }

        let raw = change.raw_content.as_deref().unwrap_or_default();
        let content = if !redirected && self.manifest.applies_to(&change.path) {
            match self.manifest.strip(raw) {
                Some(content) => content,
                None => {
                    self.reporter.note("Only version tracking changed, no patch written");
                    summary.skipped.push(change.path.clone());
                    return;
                }
            }
        } else {
            raw.to_string()
        };

        let name = patch_file_name(&change.path);
        match write_file(&self.patches_dir.join(&name), &content) {
            Ok(()) => summary.patches.push(name),
            Err(err) => self.fail(summary, change, "write patch", &err),
        }
    }

    fn fail(&mut self, summary: &mut MaterializeSummary, change: &FileChange, action: &str, err: &io::Error) {
        warn!(path = %change.path, action, error = %err, "file operation failed");
        self.reporter.failure(action, err);
        summary.failures.push(FileFailure {
            path: change.path.clone(),
            message: err.to_string(),
        });
    }
}

fn write_new_file(target: &Path, change: &FileChange) -> io::Result<()> {
    let content = added_file_content(change.raw_content.as_deref().unwrap_or_default());
    write_file(target, &content)
}

/// Write a file, creating its parent directories
fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Remove a file or symlink; `Ok(false)` if there was nothing to remove.
/// A directory is left alone and reported as an error.
fn remove_target(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        return Err(io::Error::other(format!(
            "{} is a directory locally",
            path.display()
        )));
    }
    fs::remove_file(path)?;
    Ok(true)
}
