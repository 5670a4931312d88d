//! In-memory collaborators for exercising the flows without a network.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cache::{CacheError, ContextCache, RETRY_BUDGET};
use github::{
    ChangedFile, CommitResult, CreatePrRequest, GitHubError, PullRequest, SourceRepository,
};
use testsmith_core::{CacheKey, GenerationContext, RepoRef, RepoSlug, TestFile};

use crate::engine::{GenerationEngine, GenerationRequest, RetryRequest};
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
}

#[derive(Default)]
pub struct FakeRepository {
    files: HashMap<String, String>,
    changed: Vec<ChangedFile>,
    description: String,
    logs: Vec<String>,
    fetch_delay: Option<Duration>,
    failing: HashSet<&'static str>,
    pub fetched: Mutex<Vec<String>>,
    pub branches: Mutex<Vec<(String, String)>>,
    pub commits: Mutex<Vec<RecordedCommit>>,
    pub pull_requests: Mutex<Vec<CreatePrRequest>>,
    pub log_fetches: Mutex<Vec<String>>,
    pub description_fetches: Mutex<usize>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn with_changed_files(mut self, paths: &[&str]) -> Self {
        self.changed = paths.iter().map(|p| ChangedFile::new(*p, "added")).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_logs(mut self, logs: &[&str]) -> Self {
        self.logs = logs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Makes the named operation fail, e.g. `"create_branch"`.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    fn check(&self, operation: &'static str) -> github::Result<()> {
        if self.failing.contains(operation) {
            return Err(GitHubError::Api(format!("{} failed", operation)));
        }
        Ok(())
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn branches(&self) -> Vec<(String, String)> {
        self.branches.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<CreatePrRequest> {
        self.pull_requests.lock().unwrap().clone()
    }

    pub fn log_fetch_count(&self) -> usize {
        self.log_fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceRepository for FakeRepository {
    async fn fetch_file(&self, _at: &RepoRef, path: &str) -> github::Result<String> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.fetched.lock().unwrap().push(path.to_string());
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(path.to_string()))
    }

    async fn list_changed_files(
        &self,
        _repo: &RepoSlug,
        _pr_number: u64,
    ) -> github::Result<Vec<ChangedFile>> {
        self.check("list_changed_files")?;
        Ok(self.changed.clone())
    }

    async fn pull_request_description(
        &self,
        _repo: &RepoSlug,
        _pr_number: u64,
    ) -> github::Result<String> {
        *self.description_fetches.lock().unwrap() += 1;
        Ok(self.description.clone())
    }

    async fn create_branch(
        &self,
        _repo: &RepoSlug,
        base_branch: &str,
        new_branch: &str,
    ) -> github::Result<()> {
        self.check("create_branch")?;
        self.branches
            .lock()
            .unwrap()
            .push((base_branch.to_string(), new_branch.to_string()));
        Ok(())
    }

    async fn commit_file(
        &self,
        _repo: &RepoSlug,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> github::Result<CommitResult> {
        self.check("commit_file")?;
        let mut commits = self.commits.lock().unwrap();
        let existed = commits.iter().any(|c| c.branch == branch && c.path == path);
        commits.push(RecordedCommit {
            branch: branch.to_string(),
            path: path.to_string(),
            content: content.to_string(),
            message: message.to_string(),
        });
        Ok(if existed {
            CommitResult::Updated
        } else {
            CommitResult::Created
        })
    }

    async fn open_pull_request(
        &self,
        _repo: &RepoSlug,
        request: CreatePrRequest,
    ) -> github::Result<PullRequest> {
        self.check("open_pull_request")?;
        let mut opened = self.pull_requests.lock().unwrap();
        opened.push(request.clone());
        let number = 100 + opened.len() as u64;
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/octo/demo/pull/{}", number),
            head_branch: request.head,
            base_branch: request.base,
            draft: request.draft,
        })
    }

    async fn fetch_job_logs(&self, _repo: &RepoSlug, jobs_url: &str) -> github::Result<Vec<String>> {
        self.check("fetch_job_logs")?;
        self.log_fetches.lock().unwrap().push(jobs_url.to_string());
        Ok(self.logs.clone())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheCalls {
    pub put: usize,
    pub get: usize,
    pub update: usize,
    pub delete: usize,
    pub is_exhausted: usize,
}

#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<CacheKey, (GenerationContext, i64)>>,
    fail_put: bool,
    fail_update: bool,
    calls: Mutex<CacheCalls>,
}

impl FakeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: CacheKey, context: GenerationContext, budget: i64) -> Self {
        self.entries.lock().unwrap().insert(key, (context, budget));
        self
    }

    pub fn failing_put(mut self) -> Self {
        self.fail_put = true;
        self
    }

    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    pub fn entry(&self, key: &CacheKey) -> Option<(GenerationContext, i64)> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn calls(&self) -> CacheCalls {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ContextCache for FakeCache {
    async fn put(&self, key: &CacheKey, context: &GenerationContext) -> cache::Result<()> {
        self.calls.lock().unwrap().put += 1;
        if self.fail_put {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.clone(), (context.clone(), RETRY_BUDGET));
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> cache::Result<GenerationContext> {
        self.calls.lock().unwrap().get += 1;
        let mut entries = self.entries.lock().unwrap();
        let (context, budget) = entries
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        *budget = (*budget - 1).max(0);
        Ok(context.clone())
    }

    async fn update(&self, key: &CacheKey, context: &GenerationContext) -> cache::Result<()> {
        self.calls.lock().unwrap().update += 1;
        if self.fail_update {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        let (stored, _) = entries
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        *stored = context.clone();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> cache::Result<()> {
        self.calls.lock().unwrap().delete += 1;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn is_exhausted(&self, key: &CacheKey) -> cache::Result<bool> {
        self.calls.lock().unwrap().is_exhausted += 1;
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, budget)| *budget <= 0)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

pub struct FakeEngine {
    tests: Vec<TestFile>,
    fail: bool,
    pub generated: Mutex<Vec<GenerationRequest>>,
    pub regenerated: Mutex<Vec<RetryRequest>>,
}

impl FakeEngine {
    pub fn new(tests: Vec<TestFile>) -> Self {
        Self {
            tests,
            fail: false,
            generated: Mutex::new(Vec::new()),
            regenerated: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn generated(&self) -> Vec<GenerationRequest> {
        self.generated.lock().unwrap().clone()
    }

    pub fn regenerated(&self) -> Vec<RetryRequest> {
        self.regenerated.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationEngine for FakeEngine {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<TestFile>> {
        self.generated.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(OrchestratorError::GenerationStatus {
                status: 500,
                body: "engine down".to_string(),
            });
        }
        Ok(self.tests.clone())
    }

    async fn regenerate(&self, request: &RetryRequest) -> Result<Vec<TestFile>> {
        self.regenerated.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(OrchestratorError::GenerationStatus {
                status: 500,
                body: "engine down".to_string(),
            });
        }
        Ok(self.tests.clone())
    }
}
