//! Fatal errors that abort a whole invocation.
//!
//! Per-file failures during materialization never surface here; they are
//! collected in the materialize summary instead.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no commits found in the selected range")]
    NoCommits,

    #[error("the commit {0} does not exist in the upstream repository")]
    BaseNotFound(String),

    #[error(
        "unable to resolve repository path: {0}. Path should be either a local directory, \
         a full URL, or a GitHub repository in the format \"organization/repo\""
    )]
    UnresolvableRepo(String),

    #[error("working directory {} is not usable: {source}", .path.display())]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest: {0}")]
    Manifest(String),
}
