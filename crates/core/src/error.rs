use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid repository name: {0}")]
    InvalidRepository(String),

    #[error("Invalid pull request number: {0}")]
    InvalidPullRequest(u64),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
