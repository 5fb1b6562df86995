//! Console reporting.
//!
//! Every user-facing line goes through [`Reporter`] so the output can be
//! captured in tests. Colors are only applied when the reporter is built
//! with color enabled; the plain text is identical either way.

use crate::filter::ChangeFilter;
use crate::git::{ChangeKind, CommitRef, FileChange};
use colored::{ColoredString, Colorize};
use std::fmt::Display;
use std::io::{self, Stdout, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Red,
    Cyan,
    Magenta,
    Yellow,
    Blue,
    Dim,
    Bold,
    Bright,
}

pub struct Reporter<W: Write = Stdout> {
    out: W,
    color: bool,
}

impl Reporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        let painted: ColoredString = match tone {
            Tone::Green => text.green(),
            Tone::Red => text.red(),
            Tone::Cyan => text.cyan(),
            Tone::Magenta => text.magenta(),
            Tone::Yellow => text.yellow(),
            Tone::Blue => text.blue(),
            Tone::Dim => text.dimmed(),
            Tone::Bold => text.bold(),
            Tone::Bright => text.bright_white(),
        };
        painted.to_string()
    }

    /// Write one line. Console output is best effort; a closed stdout must
    /// not abort file operations.
    pub fn line(&mut self, text: impl Display) {
        let _ = writeln!(self.out, "{text}");
    }

    /// `Adding 3`, `Deleting 1`, `Modifying 2`
    pub fn header(&mut self, label: &str, count: usize, tone: Tone) {
        let text = format!("{} {}", self.paint(label, Tone::Bold), count);
        let line = self.paint(&text, tone);
        self.line(line);
    }

    /// One file line with its action code
    pub fn entry(&mut self, change: &FileChange, code: char) {
        let tone = match code {
            'A' => Tone::Green,
            'D' => Tone::Red,
            'R' => Tone::Magenta,
            _ => Tone::Cyan,
        };
        let code = self.paint(&code.to_string(), tone);
        let line = match (&change.old_path, change.kind) {
            (Some(old), ChangeKind::Renamed) => format!("{code} {old} → {}", change.path),
            _ => format!("{code} {}", change.path),
        };
        self.line(line);
    }

    /// Indented, dimmed remark under a file line
    pub fn note(&mut self, text: &str) {
        let line = self.paint(&format!("    ({text})"), Tone::Dim);
        self.line(line);
    }

    /// Indented per-file failure
    pub fn failure(&mut self, action: &str, err: &dyn Display) {
        let line = self.paint(&format!("    ✗ Failed to {action}: {err}"), Tone::Red);
        self.line(line);
    }

    /// `   abc1234 2024-01-31 Commit summary`
    pub fn commits(&mut self, commits: &[CommitRef]) {
        for commit in commits {
            let date = commit.date.get(..10).unwrap_or(&commit.date);
            let message = self.paint(commit.message.trim(), Tone::Yellow);
            self.line(format!("   {} {} {}", commit.short_hash(), date, message));
        }
    }

    /// Banner printed before the preview, naming the active filter
    pub fn files_banner(&mut self, filter: &ChangeFilter) {
        if filter.is_empty() {
            let line = self.paint("\n📋 Files", Tone::Blue);
            self.line(line);
            return;
        }

        let mut line = format!(
            "{} {} {}",
            self.paint("\n📋 Files matching", Tone::Bold),
            filter.includes().join(", "),
            filter.exact_files().join(", ")
        );
        if !filter.excludes().is_empty() {
            let excluding = format!("\n  Excluding: {}", filter.excludes().join(", "));
            line.push_str(&self.paint(&excluding, Tone::Red));
        }
        self.line(line);
    }

    /// Instructions for finishing the update by hand or with an AI editor
    pub fn next_steps(&mut self, patches_dir: &str, working_dir: &str, instructions: Option<&str>) {
        let title = self.paint("\n📝 Next steps:", Tone::Bold);
        self.line(title);
        self.line("  1. Review the files that have been created. Delete any that are not needed.");
        let dir = self.paint(patches_dir, Tone::Bold);
        self.line(format!(
            "  2. Using your AI editor of choice, ask it to apply the patches in the {dir} directory. Here is a sample prompt:"
        ));
        self.line("\n---COPY-AND-RUN-THIS-PROMPT---");
        let prompt = apply_prompt(patches_dir, working_dir, instructions);
        let prompt = self.paint(&prompt, Tone::Bright);
        self.line(prompt);
        self.line("------------------------------\n");
    }
}

/// The copyable prompt asking an assistant to apply the patches
pub fn apply_prompt(patches_dir: &str, working_dir: &str, instructions: Option<&str>) -> String {
    [
        format!("The files in {patches_dir} are upstream patches from a similar project and we want to apply similar changes here."),
        "The project is a bit different so the patch might not match exactly, but do your best to apply it anyway.".to_string(),
        "For each patch, follow these steps before working on the next patch until all patches are applied:".to_string(),
        format!("1. If it appears the patch has not yet been applied, apply it to the matching file in {working_dir}, otherwise continue to the next step."),
        "2. Delete the patch file.".to_string(),
        String::new(),
        format!("Once you've finished applying all the patches, delete the {patches_dir} directory."),
        String::new(),
        "Here are some general notes:".to_string(),
        "- Focus on the changed lines, not the surrounding code.".to_string(),
        "- Ignore formatting changes.".to_string(),
        "- Ignore lint/type errors.".to_string(),
        instructions.unwrap_or_default().to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
pub fn captured() -> Reporter<Vec<u8>> {
    Reporter::new(Vec::new(), false)
}

#[cfg(test)]
pub fn output(reporter: Reporter<Vec<u8>>) -> String {
    String::from_utf8(reporter.into_inner()).unwrap()
}
