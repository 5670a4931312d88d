use testsmith_core::{InboundEvent, PullRequestEvent, WorkflowRunEvent};

pub const DEFAULT_WORKFLOW_NAME: &str = "Run Tests in Directory";

const CLOSED: &str = "closed";
const COMPLETED: &str = "completed";

/// Where an inbound event goes. Every route is terminal for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    PullRequestFlow(PullRequestEvent),
    WorkflowFlow(WorkflowRunEvent),
    Ignored(String),
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::PullRequestFlow(_) => "pull_request_flow",
            Route::WorkflowFlow(_) => "workflow_flow",
            Route::Ignored(_) => "ignored",
        }
    }
}

/// How a completed test workflow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conclusion {
    Success,
    Failure,
    Other(String),
}

impl Conclusion {
    pub fn of(event: &WorkflowRunEvent) -> Self {
        match event.conclusion.as_deref() {
            Some("success") => Conclusion::Success,
            Some("failure") => Conclusion::Failure,
            Some(other) => Conclusion::Other(other.to_string()),
            None => Conclusion::Other("none".to_string()),
        }
    }
}

/// Classifies events and applies the gates that need no remote state.
///
/// The pull request path has one more gate, on the testing branch, which is
/// only known once the repository settings have been read.
#[derive(Debug, Clone)]
pub struct EventRouter {
    workflow_name: String,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(DEFAULT_WORKFLOW_NAME)
    }
}

impl EventRouter {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn route(&self, event: InboundEvent) -> Route {
        match event {
            InboundEvent::PullRequest(pr) => {
                if pr.action != CLOSED {
                    Route::Ignored(format!("pull request action is {}", pr.action))
                } else if !pr.merged {
                    Route::Ignored("pull request closed without merging".to_string())
                } else {
                    Route::PullRequestFlow(pr)
                }
            }
            InboundEvent::WorkflowRun(run) => {
                if run.name != self.workflow_name {
                    Route::Ignored(format!("workflow {} is not tracked", run.name))
                } else if run.status != COMPLETED {
                    Route::Ignored(format!("workflow run is {}", run.status))
                } else {
                    Route::WorkflowFlow(run)
                }
            }
            InboundEvent::Unsupported { name } => {
                Route::Ignored(format!("unsupported event {}", name))
            }
        }
    }
}
