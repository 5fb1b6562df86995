use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// patchup - bring upstream template changes into a project as files and patches
#[derive(Parser, Debug)]
#[command(name = "patchup", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to use instead of ~/.config/patchup/config.toml
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Generate shell completions
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply commits from any repository to this project
    Apply {
        /// Upstream repository: local path, clone URL, or organization/repo.
        /// If omitted, pick one from repositories tagged with the example topic.
        #[arg(value_hint = ValueHint::Other)]
        upstream: Option<String>,

        /// Start after this commit (exclusive). Defaults to the first commit.
        #[arg(long)]
        base: Option<String>,

        /// Stop at this commit. Defaults to HEAD.
        #[arg(long)]
        head: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Apply the next batch of template updates
    Update {
        /// Start after this commit instead of the one recorded in the manifest
        #[arg(long)]
        base: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by `apply` and `update`
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Project directory to update
    #[arg(short = 'C', long = "directory", default_value = ".", value_hint = ValueHint::DirPath)]
    pub directory: PathBuf,

    /// Always take this file (suffix match), even if it matches --ignore. Repeatable.
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<String>,

    /// Only take paths matching this pattern. Repeatable.
    #[arg(long = "filter", value_name = "PATTERN")]
    pub filters: Vec<String>,

    /// Skip paths matching this pattern. Repeatable.
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignores: Vec<String>,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Generate shell completions to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    generate(shell, &mut cmd, "patchup", &mut io::stdout());
}
