mod diff;
mod repository;
mod upstream;

pub use diff::{parse_diff, ChangeKind, FileChange};
pub use repository::{working_tree_is_clean, CommitRef, Repository};
pub use upstream::{acquire, default_cache_root, RepoSource};
