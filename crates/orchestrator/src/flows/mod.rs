mod pull_request;
mod workflow_run;

use std::sync::Arc;

use cache::ContextCache;
use github::SourceRepository;
use testsmith_core::{RepoRef, RepoSettings, SETTINGS_FILE};
use tracing::{debug, warn};

use crate::engine::GenerationEngine;
use crate::pipeline::ContentResolver;
use crate::publisher::Publisher;

pub(crate) use pull_request::run as run_pull_request;
pub(crate) use workflow_run::run as run_workflow;

/// Collaborators shared by both flows.
pub(crate) struct FlowContext {
    pub repository: Arc<dyn SourceRepository>,
    pub cache: Arc<dyn ContextCache>,
    pub engine: Arc<dyn GenerationEngine>,
    pub resolver: ContentResolver,
    pub publisher: Publisher,
}

impl FlowContext {
    pub fn new(
        repository: Arc<dyn SourceRepository>,
        cache: Arc<dyn ContextCache>,
        engine: Arc<dyn GenerationEngine>,
        pipeline_capacity: usize,
    ) -> Self {
        Self {
            resolver: ContentResolver::new(Arc::clone(&repository)).with_capacity(pipeline_capacity),
            publisher: Publisher::new(Arc::clone(&repository)),
            repository,
            cache,
            engine,
        }
    }

    /// Reads the repository settings at `at`. A missing or broken file falls
    /// back to the defaults.
    pub async fn load_settings(&self, at: &RepoRef) -> RepoSettings {
        match self.repository.fetch_file(at, SETTINGS_FILE).await {
            Ok(content) => RepoSettings::from_yaml(&content).unwrap_or_else(|e| {
                warn!(repo = %at.slug, error = %e, "Ignoring invalid {}", SETTINGS_FILE);
                RepoSettings::default()
            }),
            Err(e) if e.is_not_found() => {
                debug!(repo = %at.slug, "No {}, using defaults", SETTINGS_FILE);
                RepoSettings::default()
            }
            Err(e) => {
                warn!(repo = %at.slug, error = %e, "Failed to read {}, using defaults", SETTINGS_FILE);
                RepoSettings::default()
            }
        }
    }
}
