use testsmith_core::{
    parse_description, validate_pull_number, CacheKey, GenerationContext, PullRequestEvent,
    RepoSettings,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::FlowContext;
use crate::engine::GenerationRequest;
use crate::error::Result;
use crate::outcome::{CacheOutcome, FlowOutcome};
use crate::publisher::{new_branch_name, pull_request_body};

/// Generates tests for a merged pull request and opens a draft pull request
/// carrying them.
pub(crate) async fn run(
    ctx: &FlowContext,
    event: &PullRequestEvent,
    cancel: &CancellationToken,
) -> Result<FlowOutcome> {
    let git_ref = event
        .commit_sha
        .clone()
        .unwrap_or_else(|| event.base_branch.clone());
    let at = event.repo.at(git_ref.clone());

    // A malformed slug is never fetched from; it is gated on the defaults.
    let settings = match event.repo.validate() {
        Ok(()) => ctx.load_settings(&at).await,
        Err(_) => RepoSettings::default(),
    };
    if event.base_branch != settings.testing_branch() {
        return Ok(FlowOutcome::ignored(format!(
            "merged into {}, testing branch is {}",
            event.base_branch,
            settings.testing_branch()
        )));
    }

    event.repo.validate()?;
    let number = validate_pull_number(event.number)?;

    let description = match &event.description {
        Some(description) => description.clone(),
        None => ctx
            .repository
            .pull_request_description(&event.repo, number)
            .await?,
    };
    let directives = parse_description(&description);

    let changed = ctx.repository.list_changed_files(&event.repo, number).await?;
    info!(
        repo = %event.repo,
        pr = number,
        files = changed.len(),
        "Generating tests for merged pull request"
    );

    let sources = ctx
        .resolver
        .resolve(&changed, &directives.dependencies, &at, cancel)
        .await?;

    let request = GenerationRequest {
        merge_id: GenerationRequest::merge_id(&git_ref, number),
        context: directives.context,
        options: settings.generation_options(),
        files: sources,
    };
    let tests = ctx.engine.generate(&request).await?;

    let branch = new_branch_name();
    let key = CacheKey::for_branch(&event.repo, &branch);

    let cache = if settings.caching_enabled() {
        let context = GenerationContext::new(request.files, tests.clone());
        match ctx.cache.put(&key, &context).await {
            Ok(()) => CacheOutcome::Cached,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to cache generation context");
                CacheOutcome::Error
            }
        }
    } else {
        CacheOutcome::Disabled
    };

    let body = pull_request_body(number, &tests, cache);
    let published = ctx
        .publisher
        .open_draft(&event.repo, settings.testing_branch(), &branch, &tests, body)
        .await;

    let pr = match published {
        Ok(pr) => pr,
        Err(e) => {
            if cache == CacheOutcome::Cached {
                if let Err(cleanup) = ctx.cache.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Failed to drop cache entry of unpublished branch");
                }
            }
            return Err(e);
        }
    };

    Ok(FlowOutcome::PullRequestOpened {
        branch,
        number: pr.number,
        url: pr.html_url,
        tests: tests.len(),
        cache,
    })
}
