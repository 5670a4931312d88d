use serde::{Deserialize, Serialize};

/// What happened to the generation context on the pull request path. Shown
/// in the body of the opened pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Cached,
    Error,
    Disabled,
}

impl CacheOutcome {
    pub fn marker(&self) -> &'static str {
        match self {
            CacheOutcome::Cached => "cached",
            CacheOutcome::Error => "cache error",
            CacheOutcome::Disabled => "disabled",
        }
    }
}

/// Terminal result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlowOutcome {
    Ignored {
        reason: String,
    },
    PullRequestOpened {
        branch: String,
        number: u64,
        url: String,
        tests: usize,
        cache: CacheOutcome,
    },
    CacheCleared {
        branch: String,
    },
    /// The branch used up its retry budget; nothing was regenerated.
    RetryExhausted {
        branch: String,
    },
    /// No cached context exists for the branch, so there is nothing to retry.
    NotTracked {
        branch: String,
    },
    RetryCommitted {
        branch: String,
        tests: usize,
    },
}

impl FlowOutcome {
    pub fn ignored(reason: impl Into<String>) -> Self {
        FlowOutcome::Ignored {
            reason: reason.into(),
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, FlowOutcome::Ignored { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowOutcome::Ignored { .. } => "ignored",
            FlowOutcome::PullRequestOpened { .. } => "pull_request_opened",
            FlowOutcome::CacheCleared { .. } => "cache_cleared",
            FlowOutcome::RetryExhausted { .. } => "retry_exhausted",
            FlowOutcome::NotTracked { .. } => "not_tracked",
            FlowOutcome::RetryCommitted { .. } => "retry_committed",
        }
    }
}
