use testsmith_core::{CacheKey, WorkflowRunEvent};
use tracing::{info, warn};

use super::FlowContext;
use crate::engine::RetryRequest;
use crate::error::Result;
use crate::outcome::FlowOutcome;
use crate::state_machine::Conclusion;

/// Reacts to a completed test workflow on a generated branch.
pub(crate) async fn run(ctx: &FlowContext, event: &WorkflowRunEvent) -> Result<FlowOutcome> {
    event.repo.validate()?;
    let branch = event.branch.clone();
    let key = CacheKey::for_branch(&event.repo, &branch);

    match Conclusion::of(event) {
        Conclusion::Success => {
            ctx.cache.delete(&key).await?;
            info!(key = %key, "Tests passed, cache cleared");
            Ok(FlowOutcome::CacheCleared { branch })
        }
        Conclusion::Failure => retry(ctx, event, key).await,
        Conclusion::Other(conclusion) => Ok(FlowOutcome::ignored(format!(
            "workflow concluded with {}",
            conclusion
        ))),
    }
}

async fn retry(ctx: &FlowContext, event: &WorkflowRunEvent, key: CacheKey) -> Result<FlowOutcome> {
    let branch = event.branch.clone();

    match ctx.cache.is_exhausted(&key).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(key = %key, "Retry budget exhausted");
            return Ok(FlowOutcome::RetryExhausted { branch });
        }
        Err(e) if e.is_not_found() => {
            info!(key = %key, "No cached context for branch");
            return Ok(FlowOutcome::NotTracked { branch });
        }
        Err(e) => return Err(e.into()),
    }

    let logs = ctx
        .repository
        .fetch_job_logs(&event.repo, &event.jobs_url)
        .await?;
    let cached = ctx.cache.get(&key).await?;
    let settings = ctx.load_settings(&event.repo.at(branch.clone())).await;

    let request = RetryRequest {
        cached,
        logs,
        options: settings.generation_options(),
    };
    let tests = ctx.engine.regenerate(&request).await?;

    // The branch must never hold tests the cache does not know about.
    let refreshed = request.cached.with_tests(tests.clone());
    if let Err(e) = ctx.cache.update(&key, &refreshed).await {
        warn!(key = %key, error = %e, "Failed to store regenerated tests");
        return Err(e.into());
    }

    ctx.publisher
        .commit_tests(&event.repo, &branch, &tests)
        .await?;

    info!(key = %key, tests = tests.len(), "Committed regenerated tests");
    Ok(FlowOutcome::RetryCommitted {
        branch,
        tests: tests.len(),
    })
}
