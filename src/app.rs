use crate::apply::{ApplyOutcome, ApplyRequest, Session};
use crate::cli::{Args, Command, CommonArgs};
use crate::config::{self, Config};
use crate::filter::ChangeFilter;
use crate::git::{acquire, working_tree_is_clean, RepoSource};
use crate::github::{self, RepoSummary};
use crate::prompt::{Prompt, TerminalPrompt};
use crate::report::{Reporter, Tone};
use crate::update::{self, UpdateRequest};
use anyhow::{anyhow, Result};
use clap::CommandFactory;
use std::io::Write;

/// Main application state
pub struct App {
    args: Args,
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = config::load(args.config.as_deref());
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        let Some(command) = self.args.command else {
            Args::command().print_help()?;
            return Ok(());
        };

        let mut reporter = Reporter::stdout();
        let mut prompt = TerminalPrompt::stdin();

        let outcome = match command {
            Command::Apply {
                upstream,
                base,
                head,
                common,
            } => {
                let source = match upstream {
                    Some(input) => RepoSource::parse(&input)?,
                    None => choose_example(&self.config, &mut prompt, &mut reporter)?,
                };
                let repo = acquire(&source, &self.config.cache_root(), &mut reporter)?;
                let commits = repo.commit_range(base.as_deref(), head.as_deref())?;

                if let (Some(first), Some(last)) = (commits.first(), commits.last()) {
                    let line = reporter.paint(
                        &format!(
                            "\n🔄 Getting changes from {source} from {} to {}",
                            first.short_hash(),
                            last.short_hash()
                        ),
                        Tone::Yellow,
                    );
                    reporter.line(line);
                }
                let label = reporter.paint("🔄 Changes", Tone::Bold);
                reporter.line(format!("{label} ({} commits)", commits.len()));
                reporter.commits(&commits);

                let filter = build_filter(&common);
                session(&self.config, &mut prompt, &mut reporter, &common).apply(
                    ApplyRequest {
                        working_dir: &common.directory,
                        upstream: &repo,
                        commits: &commits,
                        filter: &filter,
                        instructions: None,
                    },
                    None,
                )?
            }
            Command::Update { base, common } => {
                let source = RepoSource::parse(&self.config.template_repo)?;
                let repo = acquire(&source, &self.config.cache_root(), &mut reporter)?;
                let filter = build_filter(&common);
                update::update(
                    &mut session(&self.config, &mut prompt, &mut reporter, &common),
                    UpdateRequest {
                        working_dir: &common.directory,
                        upstream: &repo,
                        base: base.as_deref(),
                        filter: &filter,
                    },
                )?
            }
        };

        if let ApplyOutcome::Applied(summary) = outcome {
            if !summary.failures.is_empty() {
                let line = reporter.paint(
                    &format!(
                        "\n⚠️  {} file(s) could not be processed, see above",
                        summary.failures.len()
                    ),
                    Tone::Yellow,
                );
                reporter.line(line);
            }
        }
        Ok(())
    }
}

fn session<'a, W: Write>(
    config: &'a Config,
    prompt: &'a mut dyn Prompt,
    reporter: &'a mut Reporter<W>,
    common: &CommonArgs,
) -> Session<'a, W> {
    Session {
        config,
        prompt,
        reporter,
        tree_is_clean: working_tree_is_clean,
        assume_yes: common.yes,
    }
}

fn build_filter(common: &CommonArgs) -> ChangeFilter {
    ChangeFilter::new(
        common.files.clone(),
        common.filters.clone(),
        common.ignores.clone(),
    )
}

/// Let the user pick one of the repositories tagged with the example topic
fn choose_example<W: Write>(
    config: &Config,
    prompt: &mut dyn Prompt,
    reporter: &mut Reporter<W>,
) -> Result<RepoSource> {
    reporter.line("No example provided, searching for example repos 🔎");
    let repos = github::search_repos_by_topic(&config.example_topic)?;
    if repos.is_empty() {
        return Err(anyhow!(
            "No repositories found with the topic {}",
            config.example_topic
        ));
    }

    let labels: Vec<String> = repos.iter().map(RepoSummary::label).collect();
    let choice = prompt.select(
        "Select an example repository to generate a prompt from:",
        &labels,
    )?;
    let repo = choice
        .and_then(|i| repos.get(i))
        .ok_or_else(|| anyhow!("No repository selected"))?;
    Ok(RepoSource::parse(&repo.full_name)?)
}
