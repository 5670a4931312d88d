//! Installation credentials for the source host.
//!
//! A single [`TokenManager`] is built at startup and shared by every client
//! that talks to the host. It holds at most one [`Credential`] and guarantees
//! that at most one exchange is in flight at any time.

mod app;
mod manager;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::GitHubAppExchange;
pub use manager::TokenManager;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Failed to sign app assertion: {0}")]
    Signing(String),

    #[error("Credential exchange failed: {0}")]
    Exchange(String),

    #[error("Credential exchange returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Credential refresh aborted: {0}")]
    Aborted(String),
}

/// A scoped access token and the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Trades some proof of identity for a fresh [`Credential`].
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<Credential, AuthError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hands out a fixed token, e.g. a personal access token from `GITHUB_TOKEN`.
pub struct StaticTokenExchange {
    token: String,
    lifetime: Duration,
}

impl StaticTokenExchange {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            lifetime: Duration::hours(24),
        }
    }
}

#[async_trait]
impl CredentialExchange for StaticTokenExchange {
    async fn exchange(&self) -> Result<Credential, AuthError> {
        Ok(Credential::new(self.token.clone(), Utc::now() + self.lifetime))
    }
}
