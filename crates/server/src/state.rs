use std::sync::Arc;
use std::time::Duration;

use cache::CacheClient;
use github::{GitHubClient, TokenManager};
use orchestrator::{HttpGenerationEngine, Orchestrator, OrchestratorConfig};

use crate::config::ServiceConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wires the HTTP-backed collaborators described by `config`.
    pub fn from_config(config: &ServiceConfig, tokens: TokenManager) -> Result<Self, AppError> {
        let timeouts = &config.timeouts;

        let repository = GitHubClient::new(tokens, config.github.api_base.clone())?
            .with_timeout(Duration::from_secs(timeouts.repository_secs));
        let cache = CacheClient::with_timeout(
            config.cache_url.clone(),
            Duration::from_secs(timeouts.cache_secs),
        )?;
        let engine = HttpGenerationEngine::with_timeout(
            config.generation_url.clone(),
            Duration::from_secs(timeouts.generation_secs),
        )?;

        let orchestrator = Orchestrator::new(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(engine),
            OrchestratorConfig {
                workflow_name: config.workflow_name.clone(),
                ..OrchestratorConfig::default()
            },
        );

        Ok(Self::new(orchestrator))
    }
}
