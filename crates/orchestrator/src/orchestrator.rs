use std::sync::Arc;

use cache::ContextCache;
use github::SourceRepository;
use testsmith_core::InboundEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::engine::GenerationEngine;
use crate::error::{OrchestratorError, Result};
use crate::flows::{self, FlowContext};
use crate::outcome::FlowOutcome;
use crate::state_machine::{EventRouter, Route, DEFAULT_WORKFLOW_NAME};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Name of the workflow whose completion drives the retry loop.
    pub workflow_name: String,
    /// Bound of the content resolution hand-off queue.
    pub pipeline_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workflow_name: DEFAULT_WORKFLOW_NAME.to_string(),
            pipeline_capacity: 16,
        }
    }
}

/// Entry point for inbound events. Each call is independent; state only
/// carries over between calls through the context cache.
pub struct Orchestrator {
    router: EventRouter,
    flows: FlowContext,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn SourceRepository>,
        cache: Arc<dyn ContextCache>,
        engine: Arc<dyn GenerationEngine>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            router: EventRouter::new(config.workflow_name),
            flows: FlowContext::new(repository, cache, engine, config.pipeline_capacity),
        }
    }

    /// Runs the flow the event routes to. Cancelling `cancel` stops the flow
    /// at its next suspension point and aborts in-flight fetches.
    pub async fn handle(&self, event: InboundEvent, cancel: CancellationToken) -> Result<FlowOutcome> {
        let kind = event.kind().to_string();
        let route = self.router.route(event);
        debug!(kind = %kind, route = route.as_str(), "Routed event");

        let flow = async {
            match route {
                Route::Ignored(reason) => Ok(FlowOutcome::Ignored { reason }),
                Route::PullRequestFlow(pr) => {
                    let span = info_span!("pull_request_flow", repo = %pr.repo, pr = pr.number);
                    flows::run_pull_request(&self.flows, &pr, &cancel)
                        .instrument(span)
                        .await
                }
                Route::WorkflowFlow(run) => {
                    let span = info_span!("workflow_flow", repo = %run.repo, branch = %run.branch);
                    flows::run_workflow(&self.flows, &run).instrument(span).await
                }
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            outcome = flow => outcome,
        }?;

        info!(kind = %kind, outcome = outcome.name(), "Event handled");
        Ok(outcome)
    }
}
