use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Source repository error: {0}")]
    Repository(#[from] github::GitHubError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Generation engine error: {0}")]
    Generation(String),

    #[error("Generation engine returned {status}: {body}")]
    GenerationStatus { status: u16, body: String },

    #[error("Generation engine timed out after {0}s")]
    GenerationTimeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] testsmith_core::CoreError),

    #[error("Request cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
