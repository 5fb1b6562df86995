mod materialize;
mod resolve;

pub use materialize::{CompletionHook, MaterializeSummary, Materializer};
pub use resolve::{ManifestRule, Plan};
