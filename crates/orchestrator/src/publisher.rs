use std::sync::Arc;

use github::{CommitResult, CreatePrRequest, PullRequest, SourceRepository};
use testsmith_core::{RepoSlug, TestFile};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::outcome::CacheOutcome;

pub const BRANCH_PREFIX: &str = "tests/testsmith-";
pub const PULL_REQUEST_TITLE: &str = "chore: tests generated for the code added";

/// `tests/testsmith-<8 lowercase hex>`
pub fn new_branch_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", BRANCH_PREFIX, &id[..8])
}

pub fn commit_message(test: &TestFile) -> String {
    format!("Adding new file {}", test.repo_path())
}

pub fn pull_request_body(source_pr: u64, tests: &[TestFile], cache: CacheOutcome) -> String {
    let mut body = format!("Tests generated for the changes merged in #{}.\n\n", source_pr);
    for test in tests {
        body.push_str(&format!("- `{}`\n", test.repo_path()));
    }
    body.push_str(&format!("\nCache: {}\n", cache.marker()));
    body
}

/// Writes generated tests back to the repository.
pub struct Publisher {
    repository: Arc<dyn SourceRepository>,
}

impl Publisher {
    pub fn new(repository: Arc<dyn SourceRepository>) -> Self {
        Self { repository }
    }

    /// Commits every test onto `branch`, creating or updating in place.
    pub async fn commit_tests(&self, repo: &RepoSlug, branch: &str, tests: &[TestFile]) -> Result<()> {
        for test in tests {
            let result = self
                .repository
                .commit_file(repo, branch, test.repo_path(), &test.code, &commit_message(test))
                .await?;
            debug!(
                path = %test.repo_path(),
                updated = result == CommitResult::Updated,
                "Committed test file"
            );
        }
        Ok(())
    }

    /// Creates `branch` from `base`, commits the tests and opens a draft
    /// pull request back into `base`.
    pub async fn open_draft(
        &self,
        repo: &RepoSlug,
        base: &str,
        branch: &str,
        tests: &[TestFile],
        body: String,
    ) -> Result<PullRequest> {
        self.repository.create_branch(repo, base, branch).await?;
        self.commit_tests(repo, branch, tests).await?;

        let request = CreatePrRequest::new(PULL_REQUEST_TITLE, branch, base)
            .with_body(body)
            .as_draft();
        let pr = self.repository.open_pull_request(repo, request).await?;

        info!(number = pr.number, branch = %branch, "Opened draft pull request");
        Ok(pr)
    }
}
