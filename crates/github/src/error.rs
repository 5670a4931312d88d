use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimitExceeded { reset_at: String },

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] testsmith_core::CoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("No jobs listed at {0}")]
    NoJobs(String),

    #[error("Refusing to call a URL outside the API host: {0}")]
    UntrustedUrl(String),
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

impl From<octocrab::Error> for GitHubError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                if source.status_code.as_u16() == 404 {
                    GitHubError::NotFound(source.message.clone())
                } else if source.message.contains("rate limit") {
                    GitHubError::RateLimitExceeded {
                        reset_at: "unknown".to_string(),
                    }
                } else {
                    GitHubError::Api(source.message.clone())
                }
            }
            _ => GitHubError::Api(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(404) {
            GitHubError::NotFound(err.to_string())
        } else if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GitHubError>;
