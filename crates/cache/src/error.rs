use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No cached context for {0}")]
    NotFound(String),

    #[error("Retry budget for {key} is corrupt: {value:?}")]
    CorruptBudget { key: String, value: String },

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// Whether the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Unavailable(_) => true,
            CacheError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
