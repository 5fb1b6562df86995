mod app;
mod apply;
mod cli;
mod config;
mod error;
mod filter;
mod git;
mod github;
mod patch;
mod prompt;
mod report;
mod update;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Handle shell completion generation
    if let Some(shell) = args.completions {
        cli::generate_completions(shell);
        return Ok(());
    }

    init_tracing(args.verbose);

    let app = app::App::new(args)?;
    app.run()?;

    Ok(())
}

/// Diagnostics go to stderr so they never mix with the report on stdout.
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "patchup=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
