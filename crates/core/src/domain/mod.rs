mod cache_key;
mod context;
pub mod event;
mod repo;
mod source;
mod test_file;

pub use cache_key::CacheKey;
pub use context::GenerationContext;
pub use event::{EventParseError, InboundEvent, PullRequestEvent, WorkflowRunEvent};
pub use repo::{validate_pull_number, RepoRef, RepoSlug};
pub use source::{Dependency, SourceFile, FETCH_ERROR_SENTINEL};
pub use test_file::TestFile;
