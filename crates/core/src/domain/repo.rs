use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static pattern"))
}

/// An `owner/repo` pair on the source host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let parts: Vec<&str> = full_name.split('/').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Self::new(parts[0], parts[1]))
        } else {
            None
        }
    }

    /// Rejects names that would change the shape of an API path.
    pub fn validate(&self) -> Result<()> {
        for part in [&self.owner, &self.repo] {
            if !name_pattern().is_match(part) || part == "." || part == ".." {
                return Err(CoreError::InvalidRepository(self.to_string()));
            }
        }
        Ok(())
    }

    pub fn at(&self, git_ref: impl Into<String>) -> RepoRef {
        RepoRef {
            slug: self.clone(),
            git_ref: git_ref.into(),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A repository pinned to a commit SHA or branch name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub slug: RepoSlug,
    pub git_ref: String,
}

pub fn validate_pull_number(number: u64) -> Result<u64> {
    if number == 0 {
        return Err(CoreError::InvalidPullRequest(number));
    }
    Ok(number)
}
