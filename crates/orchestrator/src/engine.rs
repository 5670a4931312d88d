use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use testsmith_core::{GenerationContext, GenerationOptions, SourceFile, TestFile};
use tracing::{debug, error};

use crate::error::{OrchestratorError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Input for a first generation from a merged pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// `merge_<commit sha>_<pr number>`
    pub merge_id: String,
    pub context: String,
    pub options: GenerationOptions,
    pub files: Vec<SourceFile>,
}

impl GenerationRequest {
    pub fn merge_id(commit_sha: &str, pr_number: u64) -> String {
        format!("merge_{}_{}", commit_sha, pr_number)
    }
}

/// Input for regenerating tests after a failed test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRequest {
    pub cached: GenerationContext,
    pub logs: Vec<String>,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub tests: Vec<TestFile>,
}

/// The external service that turns source context into test code.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<TestFile>>;

    async fn regenerate(&self, request: &RetryRequest) -> Result<Vec<TestFile>>;
}

pub struct HttpGenerationEngine {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGenerationEngine {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::Generation(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self.http.post(&url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                OrchestratorError::GenerationTimeout(self.timeout.as_secs())
            } else {
                error!(error = %e, url = %url, "Generation engine request failed");
                OrchestratorError::Generation(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::GenerationStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| OrchestratorError::Generation(format!("Invalid response: {}", e)))
    }
}

#[async_trait]
impl GenerationEngine for HttpGenerationEngine {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<TestFile>> {
        debug!(
            merge_id = %request.merge_id,
            files = request.files.len(),
            "Requesting test generation"
        );
        let response: GenerationResponse = self.post("/v1/generate", request).await?;
        Ok(response.tests)
    }

    async fn regenerate(&self, request: &RetryRequest) -> Result<Vec<TestFile>> {
        debug!(
            tests = request.cached.tests.len(),
            log_lines = request.logs.len(),
            "Requesting test regeneration"
        );
        let response: GenerationResponse = self.post("/v1/regenerate", request).await?;
        Ok(response.tests)
    }
}
