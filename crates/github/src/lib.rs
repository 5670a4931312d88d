pub mod auth;
pub mod client;
pub mod error;
pub mod logs;
pub mod types;

use async_trait::async_trait;
use testsmith_core::{RepoRef, RepoSlug};

pub use auth::{
    AuthError, Clock, Credential, CredentialExchange, GitHubAppExchange, StaticTokenExchange,
    SystemClock, TokenManager,
};
pub use client::GitHubClient;
pub use error::{GitHubError, Result};
pub use types::{ChangedFile, CommitResult, CreatePrRequest, PullRequest};

/// Operations the orchestrator needs from the source host.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Raw content of `path` at the pinned ref.
    async fn fetch_file(&self, at: &RepoRef, path: &str) -> Result<String>;

    async fn list_changed_files(&self, repo: &RepoSlug, pr_number: u64)
        -> Result<Vec<ChangedFile>>;

    async fn pull_request_description(&self, repo: &RepoSlug, pr_number: u64) -> Result<String>;

    /// Creates `new_branch` pointing at the head of `base_branch`.
    async fn create_branch(&self, repo: &RepoSlug, base_branch: &str, new_branch: &str)
        -> Result<()>;

    /// Creates `path` on `branch`, or updates it in place when it already exists.
    async fn commit_file(
        &self,
        repo: &RepoSlug,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitResult>;

    async fn open_pull_request(&self, repo: &RepoSlug, request: CreatePrRequest)
        -> Result<PullRequest>;

    /// Log lines of the first job listed at `jobs_url`, timestamps stripped.
    async fn fetch_job_logs(&self, repo: &RepoSlug, jobs_url: &str) -> Result<Vec<String>>;
}
