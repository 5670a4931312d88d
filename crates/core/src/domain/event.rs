//! Typed schemas for the webhook payloads the service reacts to.
//!
//! Payloads are validated once at the boundary: a body that is missing a
//! field the flows rely on is rejected with an [`EventParseError`] instead of
//! failing later inside a flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RepoSlug;

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const WORKFLOW_RUN_EVENT: &str = "workflow_run";

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("Malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub merged: bool,
    pub base_branch: String,
    pub repo: RepoSlug,
    pub number: u64,
    pub commit_sha: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRunEvent {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub repo: RepoSlug,
    pub branch: String,
    pub jobs_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    PullRequest(PullRequestEvent),
    WorkflowRun(WorkflowRunEvent),
    Unsupported { name: String },
}

impl InboundEvent {
    /// Parses a webhook body according to the event kind header.
    pub fn parse(kind: &str, body: &[u8]) -> Result<Self, EventParseError> {
        match kind {
            PULL_REQUEST_EVENT => {
                let payload: wire::PullRequestPayload = serde_json::from_slice(body)
                    .map_err(|source| EventParseError::Malformed {
                        kind: PULL_REQUEST_EVENT,
                        source,
                    })?;
                Ok(Self::PullRequest(payload.into()))
            }
            WORKFLOW_RUN_EVENT => {
                let payload: wire::WorkflowRunPayload = serde_json::from_slice(body)
                    .map_err(|source| EventParseError::Malformed {
                        kind: WORKFLOW_RUN_EVENT,
                        source,
                    })?;
                Ok(Self::WorkflowRun(payload.into()))
            }
            other => Ok(Self::Unsupported {
                name: other.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::PullRequest(_) => PULL_REQUEST_EVENT,
            Self::WorkflowRun(_) => WORKFLOW_RUN_EVENT,
            Self::Unsupported { name } => name,
        }
    }
}

mod wire {
    use serde::Deserialize;

    use super::{PullRequestEvent, RepoSlug, WorkflowRunEvent};

    #[derive(Debug, Deserialize)]
    pub struct Owner {
        pub login: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Repository {
        pub name: String,
        pub owner: Owner,
    }

    #[derive(Debug, Deserialize)]
    pub struct BaseRef {
        #[serde(rename = "ref")]
        pub ref_field: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct PullRequest {
        pub number: u64,
        #[serde(default)]
        pub merged: bool,
        pub merge_commit_sha: Option<String>,
        pub body: Option<String>,
        pub base: BaseRef,
    }

    #[derive(Debug, Deserialize)]
    pub struct PullRequestPayload {
        pub action: String,
        pub pull_request: PullRequest,
        pub repository: Repository,
    }

    impl From<PullRequestPayload> for PullRequestEvent {
        fn from(payload: PullRequestPayload) -> Self {
            let pr = payload.pull_request;
            Self {
                action: payload.action,
                merged: pr.merged,
                base_branch: pr.base.ref_field,
                repo: RepoSlug::new(payload.repository.owner.login, payload.repository.name),
                number: pr.number,
                commit_sha: pr.merge_commit_sha,
                description: pr.body,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct WorkflowRun {
        pub name: String,
        pub conclusion: Option<String>,
        pub head_branch: String,
        pub jobs_url: String,
        pub repository: Repository,
    }

    #[derive(Debug, Deserialize)]
    pub struct WorkflowRunPayload {
        pub action: String,
        pub workflow_run: WorkflowRun,
    }

    impl From<WorkflowRunPayload> for WorkflowRunEvent {
        fn from(payload: WorkflowRunPayload) -> Self {
            let run = payload.workflow_run;
            Self {
                name: run.name,
                status: payload.action,
                conclusion: run.conclusion,
                repo: RepoSlug::new(run.repository.owner.login, run.repository.name),
                branch: run.head_branch,
                jobs_url: run.jobs_url,
            }
        }
    }
}
