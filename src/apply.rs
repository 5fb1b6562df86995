//! Bringing a range of upstream commits into a working directory.
//!
//! The run goes parse → filter → preview (dry run) → confirmation gates →
//! real run. Declining any gate ends the run before the filesystem is
//! touched.

use crate::config::Config;
use crate::error::Error;
use crate::filter::ChangeFilter;
use crate::git::{parse_diff, CommitRef, Repository};
use crate::patch::{CompletionHook, ManifestRule, MaterializeSummary, Materializer, Plan};
use crate::prompt::Prompt;
use crate::report::{Reporter, Tone};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One apply invocation
pub struct ApplyRequest<'a> {
    pub working_dir: &'a Path,
    pub upstream: &'a Repository,
    /// Commits to bring in, oldest first
    pub commits: &'a [CommitRef],
    pub filter: &'a ChangeFilter,
    /// Extra notes appended to the AI prompt
    pub instructions: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Nothing in the range survived filtering
    NoChanges,
    /// The user declined a confirmation
    Cancelled,
    Applied(MaterializeSummary),
}

/// Collaborators shared by every apply run
pub struct Session<'a, W: Write> {
    pub config: &'a Config,
    pub prompt: &'a mut dyn Prompt,
    pub reporter: &'a mut Reporter<W>,
    /// Whether the working directory has no uncommitted changes
    pub tree_is_clean: fn(&Path) -> bool,
    /// Answer yes to every confirmation
    pub assume_yes: bool,
}

impl<W: Write> Session<'_, W> {
    pub fn apply(
        &mut self,
        request: ApplyRequest<'_>,
        on_complete: Option<CompletionHook<'_>>,
    ) -> Result<ApplyOutcome> {
        let (Some(first), Some(last)) = (request.commits.first(), request.commits.last()) else {
            return Err(Error::NoCommits.into());
        };

        let working_dir = request
            .working_dir
            .canonicalize()
            .map_err(|source| Error::WorkingDir {
                path: request.working_dir.to_path_buf(),
                source,
            })?;

        let diff = request
            .upstream
            .diff_range(&first.hash, &last.hash, &self.config.ignored_paths)?;
        let changes = request.filter.apply(parse_diff(&diff));
        info!(
            from = first.short_hash(),
            to = last.short_hash(),
            files = changes.len(),
            "changes selected"
        );

        self.reporter.files_banner(request.filter);
        if changes.is_empty() {
            let line = self.reporter.paint("  No files to update", Tone::Dim);
            self.reporter.line(line);
            return Ok(ApplyOutcome::NoChanges);
        }

        let patches_dir = working_dir.join(&self.config.patches_dir);
        let manifest = ManifestRule::new(&self.config.manifest_file, &self.config.tracking_key);

        let preview = Plan::resolve(&changes, &working_dir);
        Materializer::new(&working_dir, &patches_dir, &manifest, &mut *self.reporter)
            .run(&preview, true, None)?;

        if !self.pass_gates(&working_dir, &patches_dir)? {
            return Ok(ApplyOutcome::Cancelled);
        }

        fs::create_dir_all(&patches_dir)
            .with_context(|| format!("Failed to create {}", patches_dir.display()))?;

        // Resolve again: the working tree may have changed while we waited.
        let plan = Plan::resolve(&changes, &working_dir);
        let summary = Materializer::new(&working_dir, &patches_dir, &manifest, &mut *self.reporter)
            .run(&plan, false, on_complete)?;

        if summary.modified > 0 {
            self.reporter.next_steps(
                &self.config.patches_dir,
                &working_dir.display().to_string(),
                request.instructions,
            );
        }
        Ok(ApplyOutcome::Applied(summary))
    }

    /// Ask before touching the working directory. Returns `false` if the
    /// user backed out.
    fn pass_gates(&mut self, working_dir: &Path, patches_dir: &Path) -> Result<bool> {
        if self.assume_yes {
            if patches_dir.exists() {
                remove_patches_dir(patches_dir)?;
            }
            return Ok(true);
        }

        if !(self.tree_is_clean)(working_dir) {
            self.reporter.line("");
            let proceed = self
                .prompt
                .confirm("Git working tree is not clean. Proceed anyway?", false)?;
            if !proceed {
                self.cancelled("Update canceled. Please commit or stash your changes first.");
                return Ok(false);
            }
        }

        self.reporter.line("");
        if patches_dir.exists() {
            let question = format!(
                "Patches directory found at {}.\nDo you want to replace the existing patches?",
                patches_dir.display()
            );
            if !self.prompt.confirm(&question, false)? {
                self.cancelled("Update canceled. Please handle the existing patches first.");
                return Ok(false);
            }
            remove_patches_dir(patches_dir)?;
        } else if !self
            .prompt
            .confirm("Are you sure you want to apply these changes?", false)?
        {
            self.cancelled("Update canceled.");
            return Ok(false);
        }

        Ok(true)
    }

    fn cancelled(&mut self, message: &str) {
        info!("apply cancelled by user");
        let line = self.reporter.paint(message, Tone::Blue);
        self.reporter.line(line);
    }
}

fn remove_patches_dir(patches_dir: &Path) -> Result<()> {
    fs::remove_dir_all(patches_dir)
        .with_context(|| format!("Failed to remove {}", patches_dir.display()))
}
