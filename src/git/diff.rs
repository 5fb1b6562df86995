//! Unified diff parsing.
//!
//! Parsing runs in two passes. [`split_sections`] scans the text line by line
//! and cuts it wherever a `diff --git` line opens a new file section;
//! [`extract_section`] then turns one section into a [`FileChange`]. A section
//! that cannot be understood yields `None` and is skipped, so a malformed diff
//! never aborts parsing.

use tracing::debug;

const SECTION_MARKER: &str = "diff --git ";

/// What happened to a file between the two commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
            ChangeKind::Renamed => "renamed",
        }
    }

    /// One-letter action code used in console reports
    pub fn code(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::Renamed => 'R',
        }
    }
}

/// A changed file recovered from one diff section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative target path
    pub path: String,
    /// Previous path, only for records coming from a rename section
    pub old_path: Option<String>,
    pub kind: ChangeKind,
    /// Diff text for the file; `None` for deletions
    pub raw_content: Option<String>,
}

/// Parse raw `git diff` output into file changes, in source order.
pub fn parse_diff(text: &str) -> Vec<FileChange> {
    split_sections(text)
        .into_iter()
        .filter_map(|section| {
            let change = extract_section(section);
            if change.is_none() && !section.trim().is_empty() {
                debug!(
                    header = section.lines().next().unwrap_or_default(),
                    "skipping unrecognized diff section"
                );
            }
            change
        })
        .collect()
}

/// Cut diff text into per-file sections.
///
/// Every line starting with `diff --git ` opens a section that runs up to the
/// next such line. Text before the first marker (a `git show` commit header,
/// for instance) becomes a section of its own, which the extractor rejects.
pub fn split_sections(text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with(SECTION_MARKER) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let mut sections = Vec::with_capacity(starts.len() + 1);
    let first = starts.first().copied().unwrap_or(text.len());
    if first > 0 {
        sections.push(&text[..first]);
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        sections.push(&text[start..end]);
    }
    sections
}

/// Turn one section into a [`FileChange`], or `None` if it is malformed.
pub fn extract_section(section: &str) -> Option<FileChange> {
    if section.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = section.split('\n').collect();
    let (a, b) = parse_header(lines.first()?)?;
    let markers = Markers::scan(&lines);

    let (kind, path, old_path) = if markers.new_file.is_some() {
        (ChangeKind::Added, b.to_string(), None)
    } else if markers.deleted {
        (ChangeKind::Deleted, a.to_string(), None)
    } else if markers.rename_from.is_some() || markers.rename_to.is_some() {
        let from = markers.rename_from.filter(|p| !p.is_empty()).unwrap_or(a);
        let to = markers.rename_to.filter(|p| !p.is_empty()).unwrap_or(b);
        let kind = if markers.has_content_lines {
            ChangeKind::Modified
        } else {
            ChangeKind::Renamed
        };
        (kind, to.to_string(), Some(from.to_string()))
    } else {
        (ChangeKind::Modified, b.to_string(), None)
    };

    let raw_content = match kind {
        ChangeKind::Deleted => None,
        ChangeKind::Added => Some(added_content(a, b, &lines, &markers)),
        ChangeKind::Modified | ChangeKind::Renamed => {
            Some(patch_content(a, b, &lines, &markers))
        }
    };

    Some(FileChange {
        path,
        old_path,
        kind,
        raw_content,
    })
}

/// Recover the `a/...` and `b/...` paths from a `diff --git` line.
fn parse_header(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(SECTION_MARKER).unwrap_or(line);
    let start = rest.find("a/")? + 2;
    let rest = &rest[start..];
    let split = rest.rfind(" b/")?;
    let (a, b) = (&rest[..split], &rest[split + 3..]);
    if a.is_empty() || b.trim_end().is_empty() {
        return None;
    }
    Some((a, b.trim_end_matches('\r')))
}

/// Positions and values of the extended header lines of a section
struct Markers<'a> {
    new_file: Option<usize>,
    deleted: bool,
    rename_from: Option<&'a str>,
    rename_to: Option<&'a str>,
    index: Option<usize>,
    minus: Option<usize>,
    plus: Option<usize>,
    has_content_lines: bool,
}

impl<'a> Markers<'a> {
    fn scan(lines: &[&'a str]) -> Self {
        Self {
            new_file: position(lines, "new file mode"),
            deleted: position(lines, "deleted file mode").is_some(),
            rename_from: value_after(lines, "rename from "),
            rename_to: value_after(lines, "rename to "),
            index: position(lines, "index"),
            minus: position(lines, "---"),
            plus: position(lines, "+++"),
            has_content_lines: lines.iter().any(|l| {
                (l.starts_with('+') && !l.starts_with("+++"))
                    || (l.starts_with('-') && !l.starts_with("---"))
            }),
        }
    }
}

fn position(lines: &[&str], prefix: &str) -> Option<usize> {
    lines.iter().position(|l| l.starts_with(prefix))
}

fn value_after<'a>(lines: &[&'a str], prefix: &str) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|l| l.strip_prefix(prefix))
        .map(str::trim_end)
}

/// Synthetic new-file header followed by everything after the `+++` line.
fn added_content(a: &str, b: &str, lines: &[&str], markers: &Markers) -> String {
    let mut out = vec![format!("{SECTION_MARKER}a/{a} b/{b}")];
    if let Some(i) = markers.new_file {
        out.push(lines[i].to_string());
    }
    if let Some(i) = markers.index {
        out.push(lines[i].to_string());
    }
    out.push("--- /dev/null".to_string());
    out.push(format!("+++ b/{b}"));

    match markers.plus {
        Some(i) => out.extend(lines[i + 1..].iter().map(|l| l.to_string())),
        None => {
            // Without a `+++` line only the inserted lines are trustworthy.
            let from = markers.new_file.unwrap_or(0) + 1;
            out.extend(
                lines
                    .iter()
                    .skip(from)
                    .filter(|l| l.starts_with('+'))
                    .map(|l| l.to_string()),
            );
        }
    }

    out.join("\n")
}

/// Header lines plus the hunks of a modified or renamed file.
fn patch_content(a: &str, b: &str, lines: &[&str], markers: &Markers) -> String {
    let mut out = vec![format!("{SECTION_MARKER}a/{a} b/{b}")];
    // Index of the last source line that went into the header
    let mut header_end = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("index ")
            || line.starts_with("rename from")
            || line.starts_with("rename to")
        {
            out.push(line.to_string());
            header_end = header_end.max(i);
        }
    }
    for i in [markers.minus, markers.plus].into_iter().flatten() {
        out.push(lines[i].to_string());
        header_end = header_end.max(i);
    }

    let body = match markers.plus {
        Some(i) => &lines[i + 1..],
        None => &lines[header_end + 1..],
    };
    out.extend(body.iter().map(|l| l.to_string()));

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDED: &str = "diff --git a/src/a.ts b/src/a.ts
new file mode 100644
index 0000000..3b18e51
--- /dev/null
+++ b/src/a.ts
@@ -0,0 +1,2 @@
+export const a = 1
+export const b = 2
";

    const DELETED: &str = "diff --git a/old.ts b/old.ts
deleted file mode 100644
index 3b18e51..0000000
--- a/old.ts
+++ /dev/null
@@ -1 +0,0 @@
-export const old = true
";

    const MODIFIED: &str = "diff --git a/README.md b/README.md
index 1111111..2222222 100644
--- a/README.md
+++ b/README.md
@@ -1,3 +1,3 @@
 # Test Project

-Initial setup
+Added Tailwind CSS
";

    const PURE_RENAME: &str = "diff --git a/app/old.ts b/app/new.ts
similarity index 100%
rename from app/old.ts
rename to app/new.ts
";

    const RENAME_WITH_CHANGES: &str = "diff --git a/app/old.ts b/app/new.ts
similarity index 80%
rename from app/old.ts
rename to app/new.ts
index 1111111..2222222 100644
--- a/app/old.ts
+++ b/app/new.ts
@@ -1 +1 @@
-export const x = 1
+export const x = 2
";

    #[test]
    fn test_parse_added() {
        let changes = parse_diff(ADDED);
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.path, "src/a.ts");
        assert_eq!(change.kind, ChangeKind::Added);
        assert!(change.old_path.is_none());

        let content = change.raw_content.as_deref().unwrap();
        assert!(content.starts_with("diff --git a/src/a.ts b/src/a.ts\nnew file mode 100644\nindex 0000000..3b18e51\n--- /dev/null\n+++ b/src/a.ts\n"));
        assert!(content.contains("@@ -0,0 +1,2 @@\n+export const a = 1\n+export const b = 2"));
    }

    #[test]
    fn test_parse_deleted() {
        let changes = parse_diff(DELETED);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "old.ts");
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
        assert!(changes[0].raw_content.is_none());
    }

    #[test]
    fn test_parse_modified_keeps_hunks() {
        let changes = parse_diff(MODIFIED);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "README.md");

        let content = changes[0].raw_content.as_deref().unwrap();
        assert!(content.starts_with(
            "diff --git a/README.md b/README.md\nindex 1111111..2222222 100644\n--- a/README.md\n+++ b/README.md\n@@"
        ));
        assert!(content.contains("-Initial setup\n+Added Tailwind CSS"));
    }

    #[test]
    fn test_pure_rename_is_renamed() {
        let changes = parse_diff(PURE_RENAME);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Renamed);
        assert_eq!(changes[0].path, "app/new.ts");
        assert_eq!(changes[0].old_path.as_deref(), Some("app/old.ts"));
    }

    #[test]
    fn test_rename_with_content_is_modified() {
        let changes = parse_diff(RENAME_WITH_CHANGES);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "app/new.ts");
        assert_eq!(changes[0].old_path.as_deref(), Some("app/old.ts"));

        let content = changes[0].raw_content.as_deref().unwrap();
        assert!(content.contains("rename from app/old.ts\nrename to app/new.ts"));
        assert!(content.contains("+export const x = 2"));
    }

    #[test]
    fn test_order_is_preserved() {
        let text = format!("{MODIFIED}{ADDED}{DELETED}{PURE_RENAME}");
        let kinds: Vec<_> = parse_diff(&text).iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Modified,
                ChangeKind::Added,
                ChangeKind::Deleted,
                ChangeKind::Renamed
            ]
        );
    }

    #[test]
    fn test_malformed_section_is_skipped() {
        let text = format!("diff --git nonsense without paths\n+junk\n{ADDED}");
        let changes = parse_diff(&text);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "src/a.ts");
    }

    #[test]
    fn test_commit_preamble_is_skipped() {
        let text = format!(
            "commit 0123456789abcdef\nAuthor: Test User <test@example.com>\n\n    Add a\n\n{ADDED}"
        );
        let changes = parse_diff(&text);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_diff("").is_empty());
        assert!(parse_diff("\n\n").is_empty());
    }

    #[test]
    fn test_no_markers_defaults_to_modified() {
        let changes = parse_diff("diff --git a/x.txt b/x.txt\n");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "x.txt");
    }

    #[test]
    fn test_added_without_plus_marker_keeps_insertions_only() {
        let text = "diff --git a/b.txt b/b.txt\nnew file mode 100644\n+one\n context\n+two\n";
        let changes = parse_diff(text);
        let content = changes[0].raw_content.as_deref().unwrap();
        assert_eq!(
            content,
            "diff --git a/b.txt b/b.txt\nnew file mode 100644\n--- /dev/null\n+++ b/b.txt\n+one\n+two"
        );
    }

    #[test]
    fn test_split_sections_boundaries() {
        let text = format!("preamble\n{MODIFIED}{ADDED}");
        let sections = split_sections(&text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0], "preamble\n");
        assert!(sections[1].starts_with("diff --git a/README.md"));
        assert!(sections[2].starts_with("diff --git a/src/a.ts"));
    }

    #[test]
    fn test_paths_with_spaces() {
        let text = "diff --git a/docs/my file.md b/docs/my file.md\nindex 1..2 100644\n--- a/docs/my file.md\n+++ b/docs/my file.md\n@@ -1 +1 @@\n-a\n+b\n";
        let changes = parse_diff(text);
        assert_eq!(changes[0].path, "docs/my file.md");
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ChangeKind::Added.code(), 'A');
        assert_eq!(ChangeKind::Deleted.code(), 'D');
        assert_eq!(ChangeKind::Modified.code(), 'M');
        assert_eq!(ChangeKind::Renamed.code(), 'R');
        assert_eq!(ChangeKind::Renamed.as_str(), "renamed");
    }
}
