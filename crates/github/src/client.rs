use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use parking_lot::Mutex;
use testsmith_core::{validate_pull_number, RepoRef, RepoSlug};
use tracing::{debug, info};

use crate::auth::TokenManager;
use crate::error::{GitHubError, Result};
use crate::logs::{strip_timestamps, JobList};
use crate::types::{ChangedFile, CommitResult, CreatePrRequest, PullRequest};
use crate::SourceRepository;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source repository backed by the GitHub REST API.
///
/// Every call asks the [`TokenManager`] for a token first; the octocrab
/// instance is rebuilt only when the token changes.
pub struct GitHubClient {
    tokens: TokenManager,
    api_base: String,
    http: reqwest::Client,
    timeout: Duration,
    octocrab: Mutex<Option<(String, Octocrab)>>,
}

impl GitHubClient {
    pub fn new(tokens: TokenManager, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("testsmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        Ok(Self {
            tokens,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http,
            timeout: DEFAULT_TIMEOUT,
            octocrab: Mutex::new(None),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn octocrab(&self) -> Result<Octocrab> {
        let token = self.tokens.token().await?;

        let mut cached = self.octocrab.lock();
        if let Some((current, octocrab)) = cached.as_ref() {
            if *current == token {
                return Ok(octocrab.clone());
            }
        }

        let octocrab = Octocrab::builder()
            .base_uri(self.api_base.clone())
            .map_err(|e| GitHubError::Config(e.to_string()))?
            .personal_token(token.clone())
            .build()
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        *cached = Some((token, octocrab.clone()));
        Ok(octocrab)
    }

    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GitHubError::Timeout {
                operation,
                secs: self.timeout.as_secs(),
            })?
    }

    async fn existing_file_sha(
        &self,
        octocrab: &Octocrab,
        repo: &RepoSlug,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let lookup = octocrab
            .repos(&repo.owner, &repo.repo)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await;

        match lookup {
            Ok(mut items) => Ok(items.take_items().into_iter().next().map(|item| item.sha)),
            Err(e) => {
                let err = GitHubError::from(e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn convert_pr(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
        PullRequest {
            number: pr.number,
            html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
            head_branch: pr.head.ref_field,
            base_branch: pr.base.ref_field,
            draft: pr.draft.unwrap_or(false),
        }
    }
}

#[async_trait]
impl SourceRepository for GitHubClient {
    async fn fetch_file(&self, at: &RepoRef, path: &str) -> Result<String> {
        at.slug.validate()?;
        debug!("Fetching {} at {}@{}", path, at.slug, at.git_ref);

        let octocrab = self.octocrab().await?;
        let mut items = self
            .timed("fetch file", async {
                octocrab
                    .repos(&at.slug.owner, &at.slug.repo)
                    .get_content()
                    .path(path)
                    .r#ref(&at.git_ref)
                    .send()
                    .await
                    .map_err(GitHubError::from)
            })
            .await?;

        let item = items
            .take_items()
            .into_iter()
            .next()
            .ok_or_else(|| GitHubError::NotFound(format!("{}@{}:{}", at.slug, at.git_ref, path)))?;

        item.decoded_content()
            .ok_or_else(|| GitHubError::Decode(format!("{} has no decodable content", path)))
    }

    async fn list_changed_files(
        &self,
        repo: &RepoSlug,
        pr_number: u64,
    ) -> Result<Vec<ChangedFile>> {
        repo.validate()?;
        validate_pull_number(pr_number)?;
        debug!("Listing files of {}#{}", repo, pr_number);

        let octocrab = self.octocrab().await?;
        let files = self
            .timed("list changed files", async {
                let page = octocrab
                    .pulls(&repo.owner, &repo.repo)
                    .list_files(pr_number)
                    .await?;
                octocrab.all_pages(page).await.map_err(GitHubError::from)
            })
            .await?;

        Ok(files
            .into_iter()
            .map(|entry| {
                ChangedFile::new(entry.filename, format!("{:?}", entry.status).to_lowercase())
            })
            .collect())
    }

    async fn pull_request_description(&self, repo: &RepoSlug, pr_number: u64) -> Result<String> {
        repo.validate()?;
        validate_pull_number(pr_number)?;

        let octocrab = self.octocrab().await?;
        let pr = self
            .timed("get pull request", async {
                octocrab
                    .pulls(&repo.owner, &repo.repo)
                    .get(pr_number)
                    .await
                    .map_err(GitHubError::from)
            })
            .await?;

        Ok(pr.body.unwrap_or_default())
    }

    async fn create_branch(
        &self,
        repo: &RepoSlug,
        base_branch: &str,
        new_branch: &str,
    ) -> Result<()> {
        repo.validate()?;
        info!("Creating branch {} from {} in {}", new_branch, base_branch, repo);

        let octocrab = self.octocrab().await?;
        self.timed("create branch", async {
            let handler = octocrab.repos(&repo.owner, &repo.repo);
            let base = handler
                .get_ref(&Reference::Branch(base_branch.to_string()))
                .await?;

            let sha = match base.object {
                Object::Commit { sha, .. } | Object::Tag { sha, .. } => sha,
                other => {
                    return Err(GitHubError::Decode(format!(
                        "unexpected ref object for {}: {:?}",
                        base_branch, other
                    )))
                }
            };

            handler
                .create_ref(&Reference::Branch(new_branch.to_string()), sha)
                .await?;
            Ok::<_, GitHubError>(())
        })
        .await
    }

    async fn commit_file(
        &self,
        repo: &RepoSlug,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitResult> {
        repo.validate()?;

        let octocrab = self.octocrab().await?;
        self.timed("commit file", async {
            let existing = self
                .existing_file_sha(&octocrab, repo, branch, path)
                .await?;
            let handler = octocrab.repos(&repo.owner, &repo.repo);

            let result = match existing {
                Some(sha) => {
                    debug!("Updating {} on {} ({})", path, branch, sha);
                    handler
                        .update_file(path, message, content, sha)
                        .branch(branch)
                        .send()
                        .await?;
                    CommitResult::Updated
                }
                None => {
                    debug!("Creating {} on {}", path, branch);
                    handler
                        .create_file(path, message, content)
                        .branch(branch)
                        .send()
                        .await?;
                    CommitResult::Created
                }
            };
            Ok::<_, GitHubError>(result)
        })
        .await
    }

    async fn open_pull_request(
        &self,
        repo: &RepoSlug,
        request: CreatePrRequest,
    ) -> Result<PullRequest> {
        repo.validate()?;
        info!(
            "Creating PR: {} ({} -> {})",
            request.title, request.head, request.base
        );

        let octocrab = self.octocrab().await?;
        let pr = self
            .timed("open pull request", async {
                octocrab
                    .pulls(&repo.owner, &repo.repo)
                    .create(&request.title, &request.head, &request.base)
                    .body(&request.body)
                    .draft(request.draft)
                    .send()
                    .await
                    .map_err(GitHubError::from)
            })
            .await?;

        Ok(Self::convert_pr(pr))
    }

    async fn fetch_job_logs(&self, repo: &RepoSlug, jobs_url: &str) -> Result<Vec<String>> {
        repo.validate()?;
        // The token must never be sent anywhere but the configured API host.
        if !jobs_url.starts_with(&format!("{}/", self.api_base)) {
            return Err(GitHubError::UntrustedUrl(jobs_url.to_string()));
        }

        let token = self.tokens.token().await?;

        let raw = self
            .timed("fetch job logs", async {
                let jobs: JobList = self
                    .http
                    .get(jobs_url)
                    .bearer_auth(&token)
                    .header("Accept", "application/vnd.github+json")
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                let job = jobs
                    .jobs
                    .first()
                    .ok_or_else(|| GitHubError::NoJobs(jobs_url.to_string()))?;
                debug!("Downloading logs of job {} in {}", job.id, repo);

                let logs_url = format!(
                    "{}/repos/{}/{}/actions/jobs/{}/logs",
                    self.api_base, repo.owner, repo.repo, job.id
                );
                let text = self
                    .http
                    .get(logs_url)
                    .bearer_auth(&token)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                Ok::<_, GitHubError>(text)
            })
            .await?;

        Ok(strip_timestamps(&raw))
    }
}
