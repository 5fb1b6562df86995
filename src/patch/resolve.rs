//! Deciding what happens to each changed file.

use crate::git::{ChangeKind, FileChange};
use std::path::Path;
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tiff",
];

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Changes grouped by the action that will be taken for them
#[derive(Debug, Default)]
pub struct Plan<'a> {
    /// New files written directly into the working tree
    pub create: Vec<&'a FileChange>,
    /// Files removed from the working tree
    pub delete: Vec<&'a FileChange>,
    /// Modified and renamed files, written as patches
    pub patch: Vec<&'a FileChange>,
    /// Added files that already exist locally, written as patches instead
    pub redirected: Vec<&'a FileChange>,
}

impl<'a> Plan<'a> {
    /// Sort changes into actions by looking at the working tree.
    ///
    /// Only reads the filesystem. An added file whose target already exists
    /// is never created; it is redirected to a patch so local content is
    /// not overwritten.
    pub fn resolve(changes: &'a [FileChange], working_dir: &Path) -> Self {
        let mut plan = Plan::default();
        for change in changes {
            match change.kind {
                ChangeKind::Added if target_exists(&working_dir.join(&change.path)) => {
                    debug!(path = %change.path, "added file already exists, redirecting to patch");
                    plan.redirected.push(change);
                }
                ChangeKind::Added => plan.create.push(change),
                ChangeKind::Deleted => plan.delete.push(change),
                ChangeKind::Modified | ChangeKind::Renamed => plan.patch.push(change),
            }
        }
        plan
    }
}

/// Existence check that also counts dangling symlinks
pub fn target_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Name of the patch file for a repository path.
///
/// A leading dot is escaped as `_.`, every `/` becomes `_`, and `.patch` is
/// appended: `.cursor/rules/x.mdc` becomes `_.cursor_rules_x.mdc.patch`.
pub fn patch_file_name(path: &str) -> String {
    let escaped = match path.strip_prefix('.') {
        Some(rest) => format!("_.{rest}"),
        None => path.to_string(),
    };
    format!("{}.patch", escaped.replace('/', "_"))
}

/// Whether the path has an image extension; images never get text patches
pub fn is_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Contents of a new file, rebuilt from the inserted lines of its diff.
///
/// Everything up to the `+++` line is header. Only lines starting with `+`
/// are kept, without that first character. The file ends with a newline
/// unless git marked it otherwise.
pub fn added_file_content(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let start = lines
        .iter()
        .position(|l| l.starts_with("+++"))
        .map_or(0, |i| i + 1);
    let body = &lines[start..];

    let added: Vec<&str> = body.iter().filter_map(|l| l.strip_prefix('+')).collect();
    let mut content = added.join("\n");
    if !added.is_empty() && !body.iter().any(|l| l.starts_with(NO_NEWLINE_MARKER)) {
        content.push('\n');
    }
    content
}

/// The package manifest and the property in it that records which upstream
/// commit the project is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRule {
    pub file_name: String,
    pub tracking_key: String,
}

impl ManifestRule {
    pub fn new(file_name: impl Into<String>, tracking_key: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            tracking_key: tracking_key.into(),
        }
    }

    pub fn applies_to(&self, path: &str) -> bool {
        path == self.file_name
    }

    /// Drop the version-tracking lines from a manifest patch.
    ///
    /// Returns `None` when nothing but version tracking changed.
    pub fn strip(&self, raw: &str) -> Option<String> {
        let key = format!("\"{}\"", self.tracking_key);
        let tokens = [key.as_str(), "\"head\"", "\"date\""];

        let kept: Vec<&str> = raw
            .split('\n')
            .filter(|line| {
                let trimmed = line.trim();
                !tokens.iter().any(|token| trimmed.contains(token))
            })
            .collect();

        let has_changes = kept.iter().any(|l| {
            (l.starts_with('+') && !l.starts_with("+++"))
                || (l.starts_with('-') && !l.starts_with("---"))
        });
        has_changes.then(|| kept.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn change(path: &str, kind: ChangeKind) -> FileChange {
        FileChange {
            path: path.to_string(),
            old_path: None,
            kind,
            raw_content: None,
        }
    }

    #[test]
    fn test_patch_file_name() {
        assert_eq!(
            patch_file_name(".cursor/rules/x.mdc"),
            "_.cursor_rules_x.mdc.patch"
        );
        assert_eq!(patch_file_name("src/a.ts"), "src_a.ts.patch");
        assert_eq!(patch_file_name("package.json"), "package.json.patch");
        assert_eq!(patch_file_name(".env.example"), "_.env.example.patch");
    }

    #[test]
    fn test_is_image() {
        for path in ["logo.png", "a/b/photo.JPG", "icon.svg", "favicon.ico", "x.tiff"] {
            assert!(is_image(path), "{path}");
        }
        for path in ["app.ts", "png", "README", "image.png.txt"] {
            assert!(!is_image(path), "{path}");
        }
    }

    #[test]
    fn test_added_file_content() {
        let raw = "diff --git a/src/a.ts b/src/a.ts\nnew file mode 100644\n--- /dev/null\n+++ b/src/a.ts\n@@ -0,0 +1,2 @@\n+export const a = 1\n+export const b = 2\n";
        assert_eq!(
            added_file_content(raw),
            "export const a = 1\nexport const b = 2\n"
        );
    }

    #[test]
    fn test_added_file_content_without_trailing_newline() {
        let raw = "+++ b/a.txt\n@@ -0,0 +1 @@\n+last line\n\\ No newline at end of file\n";
        assert_eq!(added_file_content(raw), "last line");
    }

    #[test]
    fn test_added_file_content_keeps_plus_prefixed_text() {
        let raw = "+++ b/notes.md\n@@ -0,0 +1,2 @@\n++ nested plus\n+\n";
        assert_eq!(added_file_content(raw), "+ nested plus\n\n");
    }

    #[test]
    fn test_manifest_strip_only_tracking_changes() {
        let rule = ManifestRule::new("package.json", "epic-stack");
        let raw = "diff --git a/package.json b/package.json\n--- a/package.json\n+++ b/package.json\n@@ -2,7 +2,7 @@\n   \"epic-stack\": {\n-    \"head\": \"aaa\",\n-    \"date\": \"2024-01-01\"\n+    \"head\": \"bbb\",\n+    \"date\": \"2024-02-01\"\n   },\n";
        assert_eq!(rule.strip(raw), None);
    }

    #[test]
    fn test_manifest_strip_keeps_real_changes() {
        let rule = ManifestRule::new("package.json", "epic-stack");
        let raw = "--- a/package.json\n+++ b/package.json\n@@ -2,6 +2,7 @@\n-    \"head\": \"aaa\",\n+    \"head\": \"bbb\",\n+    \"tailwindcss\": \"^3.0.0\",\n";
        let stripped = rule.strip(raw).unwrap();
        assert!(stripped.contains("+    \"tailwindcss\": \"^3.0.0\","));
        assert!(!stripped.contains("\"head\""));
    }

    #[test]
    fn test_plan_redirects_existing_additions() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/exists.ts"), "local").unwrap();

        let changes = vec![
            change("src/exists.ts", ChangeKind::Added),
            change("src/new.ts", ChangeKind::Added),
            change("old.ts", ChangeKind::Deleted),
            change("README.md", ChangeKind::Modified),
            change("app/new.ts", ChangeKind::Renamed),
        ];
        let plan = Plan::resolve(&changes, dir.path());

        let paths = |v: &[&FileChange]| v.iter().map(|c| c.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&plan.create), vec!["src/new.ts"]);
        assert_eq!(paths(&plan.redirected), vec!["src/exists.ts"]);
        assert_eq!(paths(&plan.delete), vec!["old.ts"]);
        assert_eq!(paths(&plan.patch), vec!["README.md", "app/new.ts"]);
    }
}
