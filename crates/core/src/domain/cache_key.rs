use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RepoSlug;

/// Identifies one generation/retry cycle: `owner/repo/tree/branch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(owner: &str, repo: &str, branch: &str) -> Self {
        Self(format!("{}/{}/tree/{}", owner, repo, branch))
    }

    pub fn for_branch(slug: &RepoSlug, branch: &str) -> Self {
        Self::new(&slug.owner, &slug.repo, branch)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
