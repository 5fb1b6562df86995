//! Moving a project forward along its template's history.
//!
//! The commit a project was generated from is recorded in its manifest under
//! the tracking key. Commits after it are split into batches that end at
//! bookmarked commits, and one batch is applied per run.

use crate::apply::{ApplyOutcome, ApplyRequest, Session};
use crate::error::Error;
use crate::filter::ChangeFilter;
use crate::git::{CommitRef, Repository};
use crate::patch::ManifestRule;
use crate::report::Tone;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// File written into the patches directory that tells the assistant how to
/// wrap up once every other patch is applied
pub const CLOSING_PROMPT_FILE: &str = "_DO_THIS_FILE_LAST.prompt";

/// A named upstream commit that closes an update batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub commit: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Bookmark {
    fn new(commit: &str, description: &str, instructions: Option<&str>) -> Self {
        Self {
            commit: commit.to_string(),
            description: description.to_string(),
            instructions: instructions.map(String::from),
        }
    }

    fn marks(&self, commit: &CommitRef) -> bool {
        !self.commit.is_empty() && commit.hash.starts_with(&self.commit)
    }
}

/// Milestones of the default template
pub fn default_bookmarks() -> Vec<Bookmark> {
    vec![
        Bookmark::new(
            "62e65077269d803627418677f180a77aab2bff53",
            "Use native ESM",
            None,
        ),
        Bookmark::new("bc93804353cf89c8c901e1a8b629ad25ac0a4e3c", "Add shadcn/ui", None),
        Bookmark::new(
            "5cb51100ddc97cd31ec53036c42f7fae7ff15572",
            "Bring improvements from workshops",
            None,
        ),
        Bookmark::new(
            "49897824f942576c32aba6876ff52e323eec5144",
            "Change relative imports to node resolution",
            None,
        ),
        Bookmark::new(
            "90ef60d4b2e762a1888fc72abd71f40a5142f978",
            "Update @epic-web/config",
            None,
        ),
        Bookmark::new(
            "158ed99889e628410cf760e78bb07e09622a87e4",
            "React Router v7",
            Some(
                "This update migrates @remix-run/* to react-router and @react-router/node. \
                 Pay special attention to the imports.",
            ),
        ),
        Bookmark::new(
            "c33b520795f7cb713894f535e23d7c7400932853",
            "v7 typegen",
            Some(
                "Route types are now imported from a typegen +types/ directory which is created \
                 by running `npx react-router typegen`. It is ok to leave module resolution \
                 errors here while you are patching, we can run the typegen once at the very end.",
            ),
        ),
        Bookmark::new(
            "0345ff7d775569352a18f13908c817623e2981d5",
            "Move images from SQLite to Tigris",
            None,
        ),
    ]
}

/// Commits applied together in one update run
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBatch {
    pub label: String,
    pub commits: Vec<CommitRef>,
    pub instructions: Option<String>,
}

/// Split `commits` (oldest first) into batches ending at bookmarks.
///
/// `[skip ci]` commits are dropped unless they are bookmarks themselves.
/// Whatever follows the last bookmark becomes a "Latest commits" batch.
pub fn group_updates(commits: Vec<CommitRef>, bookmarks: &[Bookmark]) -> Vec<UpdateBatch> {
    let mut batches = Vec::new();
    let mut batch = Vec::new();

    for commit in commits {
        let bookmark = bookmarks.iter().find(|b| b.marks(&commit));
        if bookmark.is_none() && commit.message.contains("[skip ci]") {
            debug!(commit = commit.short_hash(), "skipping [skip ci] commit");
            continue;
        }
        batch.push(commit);

        if let Some(bookmark) = bookmark {
            batches.push(UpdateBatch {
                label: bookmark.description.clone(),
                commits: std::mem::take(&mut batch),
                instructions: bookmark.instructions.clone(),
            });
        }
    }

    if !batch.is_empty() {
        batches.push(UpdateBatch {
            label: "Latest commits".to_string(),
            commits: batch,
            instructions: None,
        });
    }
    batches
}

/// Read the upstream commit the project was last updated to.
pub fn read_tracked_head(working_dir: &Path, manifest: &ManifestRule) -> Result<String> {
    let path = working_dir.join(&manifest.file_name);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&text)
        .map_err(|err| Error::Manifest(format!("{} is not valid JSON: {err}", path.display())))?;

    let Some(value) = json.get(&manifest.tracking_key) else {
        return Err(Error::Manifest(format!(
            "{} has no \"{}\" property; pass --base to choose a starting commit",
            manifest.file_name, manifest.tracking_key
        ))
        .into());
    };

    if value.is_boolean() {
        return Err(Error::Manifest(format!(
            "\"{}\" in {} does not record a commit; pass --base to choose a starting commit",
            manifest.tracking_key, manifest.file_name
        ))
        .into());
    }

    let head = value.get("head").and_then(Value::as_str);
    let dated = value.get("date").is_some_and(Value::is_string);
    match head {
        Some(head) if dated => Ok(head.to_string()),
        _ => Err(Error::Manifest(format!(
            "\"{}\" in {} should look like {{\"head\": \"<sha>\", \"date\": \"<date>\"}}",
            manifest.tracking_key, manifest.file_name
        ))
        .into()),
    }
}

/// Close-out instructions for the last commit of a batch
pub fn closing_prompt(
    patches_dir: &Path,
    patches_dir_name: &str,
    manifest: &ManifestRule,
    last: &CommitRef,
) -> String {
    format!(
        r#"
Check to see how many files are in {dir}

If there is more than one, stop reading this file and go back to processing the other patches.

If this is the only file, complete these closing steps.
1. Update the "{key}" property in the {file} to the following:

"{key}": {{
  "head": "{head}",
  "date": "{date}"
}}

2. Delete the {patches_dir_name} directory.
3. Thank the user for using patchup, and tell them to run `patchup update` to check for any remaining updates.
"#,
        dir = patches_dir.display(),
        key = manifest.tracking_key,
        file = manifest.file_name,
        head = last.hash,
        date = last.date,
    )
}

pub struct UpdateRequest<'a> {
    pub working_dir: &'a Path,
    pub upstream: &'a Repository,
    /// Start after this commit instead of the one recorded in the manifest
    pub base: Option<&'a str>,
    pub filter: &'a ChangeFilter,
}

/// Apply the next batch of template commits.
pub fn update<W: Write>(
    session: &mut Session<'_, W>,
    request: UpdateRequest<'_>,
) -> Result<ApplyOutcome> {
    let config = session.config;
    let manifest = ManifestRule::new(&config.manifest_file, &config.tracking_key);

    let base = match request.base {
        Some(base) => base.to_string(),
        None => read_tracked_head(request.working_dir, &manifest)?,
    };
    info!(base = %base, "looking for template updates");

    let commits = match request.upstream.commit_range(Some(&base), None) {
        Ok(commits) => commits,
        Err(err) if matches!(err.downcast_ref::<Error>(), Some(Error::NoCommits)) => Vec::new(),
        Err(err) => return Err(err),
    };

    let mut batches = group_updates(commits, &config.bookmarks).into_iter();
    let Some(batch) = batches.next() else {
        let line = session.reporter.paint("\n✅ No updates found", Tone::Green);
        session.reporter.line(line);
        return Ok(ApplyOutcome::NoChanges);
    };

    let reporter = &mut *session.reporter;
    let short_base = base.get(..7).unwrap_or(&base);
    let line = reporter.paint(
        &format!("\n🔄 Updating {} from {short_base}", request.working_dir.display()),
        Tone::Yellow,
    );
    reporter.line(line);
    let label = reporter.paint(&format!("🔄 {}", batch.label), Tone::Bold);
    reporter.line(format!("{label} ({} commits)", batch.commits.len()));
    reporter.commits(&batch.commits);
    for future in batches {
        let label = reporter.paint(
            &format!("🔄 {} ({} commits)", future.label, future.commits.len()),
            Tone::Dim,
        );
        reporter.line(format!("Future:  {label}"));
    }

    let Some(last) = batch.commits.last() else {
        return Ok(ApplyOutcome::NoChanges);
    };
    let patches_dir = request.working_dir.join(&config.patches_dir);
    let mut write_closing_prompt = || -> Result<()> {
        let path = patches_dir.join(CLOSING_PROMPT_FILE);
        let text = closing_prompt(&patches_dir, &config.patches_dir, &manifest, last);
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    };

    session.apply(
        ApplyRequest {
            working_dir: request.working_dir,
            upstream: request.upstream,
            commits: &batch.commits,
            filter: request.filter,
            instructions: batch.instructions.as_deref(),
        },
        Some(&mut write_closing_prompt),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::test_support::{commit_all, init_repo};
    use crate::prompt::ScriptedPrompt;
    use crate::report::{captured, output};

    fn commit(hash: &str, message: &str) -> CommitRef {
        CommitRef {
            hash: hash.to_string(),
            date: "2024-03-01T10:00:00+00:00".to_string(),
            message: message.to_string(),
        }
    }

    fn rule() -> ManifestRule {
        ManifestRule::new("package.json", "epic-stack")
    }

    #[test]
    fn test_group_updates_splits_at_bookmarks() {
        let bookmarks = vec![Bookmark::new("bbb", "Second", Some("Careful"))];
        let commits = vec![
            commit("aaa111", "one"),
            commit("bbb222", "two"),
            commit("ccc333", "three"),
        ];

        let batches = group_updates(commits, &bookmarks);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].label, "Second");
        assert_eq!(batches[0].commits.len(), 2);
        assert_eq!(batches[0].instructions.as_deref(), Some("Careful"));
        assert_eq!(batches[1].label, "Latest commits");
        assert_eq!(batches[1].commits[0].hash, "ccc333");
        assert_eq!(batches[1].instructions, None);
    }

    #[test]
    fn test_group_updates_drops_skip_ci_unless_bookmarked() {
        let bookmarks = vec![Bookmark::new("bbb", "Release", None)];
        let commits = vec![
            commit("aaa111", "chore: format [skip ci]"),
            commit("bbb222", "release [skip ci]"),
            commit("ccc333", "docs [skip ci]"),
        ];

        let batches = group_updates(commits, &bookmarks);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].commits.len(), 1);
        assert_eq!(batches[0].commits[0].hash, "bbb222");
    }

    #[test]
    fn test_group_updates_empty() {
        assert!(group_updates(vec![], &default_bookmarks()).is_empty());
    }

    #[test]
    fn test_default_bookmarks_carry_migration_notes() {
        let bookmarks = default_bookmarks();
        assert_eq!(bookmarks.len(), 8);
        let with_notes: Vec<_> = bookmarks
            .iter()
            .filter(|b| b.instructions.is_some())
            .map(|b| b.description.as_str())
            .collect();
        assert_eq!(with_notes, vec!["React Router v7", "v7 typegen"]);
    }

    #[test]
    fn test_read_tracked_head() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "app", "epic-stack": {"head": "abc123", "date": "2024-01-01"}}"#,
        )
        .unwrap();
        assert_eq!(read_tracked_head(dir.path(), &rule()).unwrap(), "abc123");
    }

    #[test]
    fn test_read_tracked_head_rejects_legacy_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"epic-stack": true}"#).unwrap();
        let err = read_tracked_head(dir.path(), &rule()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Manifest(_))));
    }

    #[test]
    fn test_read_tracked_head_missing_property() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        let err = read_tracked_head(dir.path(), &rule()).unwrap_err();
        assert!(err.to_string().contains("pass --base"));
    }

    #[test]
    fn test_read_tracked_head_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_tracked_head(dir.path(), &rule()).is_err());
    }

    #[test]
    fn test_read_tracked_head_needs_head_and_date() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"epic-stack": {"head": "abc123"}}"#).unwrap();
        let err = read_tracked_head(dir.path(), &rule()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Manifest(_))));

        fs::write(dir.path().join("package.json"), r#"{"epic-stack": "abc123"}"#).unwrap();
        assert!(read_tracked_head(dir.path(), &rule()).is_err());
    }

    #[test]
    fn test_closing_prompt_names_last_commit() {
        let last = commit("fff999", "last");
        let text = closing_prompt(Path::new("/w/_patchup-patches"), "_patchup-patches", &rule(), &last);
        assert!(text.contains("Check to see how many files are in /w/_patchup-patches"));
        assert!(text.contains("\"head\": \"fff999\""));
        assert!(text.contains("\"date\": \"2024-03-01T10:00:00+00:00\""));
        assert!(text.contains("2. Delete the _patchup-patches directory."));
    }

    #[test]
    fn test_update_applies_first_batch_only() {
        let up_dir = tempfile::tempdir().unwrap();
        let git = init_repo(up_dir.path());
        fs::write(up_dir.path().join("README.md"), "template\n").unwrap();
        let base = commit_all(&git, "Initial commit");
        fs::write(up_dir.path().join("one.txt"), "1\n").unwrap();
        commit_all(&git, "Add one");
        fs::write(up_dir.path().join("two.txt"), "2\n").unwrap();
        let second = commit_all(&git, "Add two");
        fs::write(up_dir.path().join("three.txt"), "3\n").unwrap();
        commit_all(&git, "Add three");
        let upstream = Repository::open(up_dir.path()).unwrap();

        let work = tempfile::tempdir().unwrap();
        fs::write(
            work.path().join("package.json"),
            format!(r#"{{"epic-stack": {{"head": "{base}", "date": "2024-01-01"}}}}"#),
        )
        .unwrap();

        let config = Config {
            bookmarks: vec![Bookmark::new(&second.to_string(), "Two files", None)],
            ..Config::default()
        };
        let mut prompt = ScriptedPrompt::new(&[true]);
        let mut reporter = captured();
        let outcome = update(
            &mut Session {
                config: &config,
                prompt: &mut prompt,
                reporter: &mut reporter,
                tree_is_clean: |_| true,
                assume_yes: false,
            },
            UpdateRequest {
                working_dir: work.path(),
                upstream: &upstream,
                base: None,
                filter: &ChangeFilter::default(),
            },
        )
        .unwrap();

        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
        assert!(work.path().join("one.txt").exists());
        assert!(work.path().join("two.txt").exists());
        assert!(!work.path().join("three.txt").exists());

        let closing = fs::read_to_string(
            work.path().join("_patchup-patches").join(CLOSING_PROMPT_FILE),
        )
        .unwrap();
        assert!(closing.contains(&second.to_string()));

        let out = output(reporter);
        assert!(out.contains("🔄 Two files (2 commits)"));
        assert!(out.contains("Future:  🔄 Latest commits (1 commits)"));
    }

    #[test]
    fn test_update_with_nothing_new() {
        let up_dir = tempfile::tempdir().unwrap();
        let git = init_repo(up_dir.path());
        fs::write(up_dir.path().join("README.md"), "template\n").unwrap();
        let head = commit_all(&git, "Initial commit");
        let upstream = Repository::open(up_dir.path()).unwrap();
        let work = tempfile::tempdir().unwrap();

        let config = Config::default();
        let mut prompt = ScriptedPrompt::new(&[]);
        let mut reporter = captured();
        let head = head.to_string();
        let outcome = update(
            &mut Session {
                config: &config,
                prompt: &mut prompt,
                reporter: &mut reporter,
                tree_is_clean: |_| true,
                assume_yes: false,
            },
            UpdateRequest {
                working_dir: work.path(),
                upstream: &upstream,
                base: Some(&head),
                filter: &ChangeFilter::default(),
            },
        )
        .unwrap();

        assert_eq!(outcome, ApplyOutcome::NoChanges);
        assert!(output(reporter).contains("No updates found"));
    }
}
