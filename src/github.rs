use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::process::Command;

/// A repository returned by `gh search repos`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
}

impl RepoSummary {
    /// One line for a selection list
    pub fn label(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!(
                "{} ★{} - {}",
                self.full_name, self.stargazers_count, description
            ),
            None => format!("{} ★{}", self.full_name, self.stargazers_count),
        }
    }
}

/// Search GitHub for repositories tagged with `topic`, most starred first,
/// using the gh CLI
pub fn search_repos_by_topic(topic: &str) -> Result<Vec<RepoSummary>> {
    let output = Command::new("gh")
        .args([
            "search",
            "repos",
            "--topic",
            topic,
            "--sort",
            "stars",
            "--json",
            "fullName,description,stargazersCount",
            "--limit",
            "50",
        ])
        .output()
        .context("Failed to execute gh CLI. Is it installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("gh search repos failed: {}", stderr));
    }

    parse_repo_list(&output.stdout)
}

fn parse_repo_list(json: &[u8]) -> Result<Vec<RepoSummary>> {
    serde_json::from_slice(json).context("Failed to parse gh output")
}
