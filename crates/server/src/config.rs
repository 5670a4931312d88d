use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use github::client::DEFAULT_API_BASE;
use orchestrator::DEFAULT_WORKFLOW_NAME;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("{0}")]
    Incomplete(String),
}

/// Service configuration: TOML file first, then environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub github: GitHubConfig,
    pub generation_url: String,
    pub cache_url: String,
    pub workflow_name: String,
    pub credentials: RefreshConfig,
    pub timeouts: TimeoutConfig,
    pub cache_service: CacheServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub app_id: Option<String>,
    pub installation_id: Option<u64>,
    pub private_key_path: Option<PathBuf>,
    /// Static token, used when no GitHub App is configured.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub margin_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub generation_secs: u64,
    pub cache_secs: u64,
    pub repository_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheServiceConfig {
    pub port: u16,
    pub database_url: String,
}

/// How the service authenticates against GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubAuth {
    App {
        app_id: String,
        installation_id: u64,
        private_key_path: PathBuf,
    },
    Token(String),
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            github: GitHubConfig::default(),
            generation_url: "http://localhost:8000".to_string(),
            cache_url: "http://localhost:8081".to_string(),
            workflow_name: DEFAULT_WORKFLOW_NAME.to_string(),
            credentials: RefreshConfig::default(),
            timeouts: TimeoutConfig::default(),
            cache_service: CacheServiceConfig::default(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            app_id: None,
            installation_id: None,
            private_key_path: None,
            token: None,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            margin_secs: 120,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: 15,
            cache_secs: 30,
            repository_secs: 30,
        }
    }
}

impl Default for CacheServiceConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            database_url: "sqlite:testsmith-cache.db".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Reads `path` when given, then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!(path = %path.display(), "Loaded config file");
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides fields from `lookup`, which maps variable names to values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("TESTSMITH_PORT") {
            self.port = parse_env("TESTSMITH_PORT", port)?;
        }
        if let Some(api_base) = lookup("GITHUB_API_URL") {
            self.github.api_base = api_base;
        }
        if let Some(app_id) = lookup("GITHUB_APP_ID") {
            self.github.app_id = Some(app_id);
        }
        if let Some(id) = lookup("GITHUB_INSTALLATION_ID") {
            self.github.installation_id = Some(parse_env("GITHUB_INSTALLATION_ID", id)?);
        }
        if let Some(path) = lookup("GITHUB_PRIVATE_KEY_PATH") {
            self.github.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(url) = lookup("GENERATION_ENGINE_URL") {
            self.generation_url = url;
        }
        if let Some(url) = lookup("CACHE_SERVICE_URL") {
            self.cache_url = url;
        }
        if let Some(name) = lookup("TEST_WORKFLOW_NAME") {
            self.workflow_name = name;
        }
        if let Some(url) = lookup("CACHE_DATABASE_URL") {
            self.cache_service.database_url = url;
        }
        Ok(())
    }

    /// A complete GitHub App configuration wins over a static token.
    pub fn github_auth(&self) -> Result<GitHubAuth, ConfigError> {
        let github = &self.github;
        match (&github.app_id, github.installation_id, &github.private_key_path) {
            (Some(app_id), Some(installation_id), Some(path)) => Ok(GitHubAuth::App {
                app_id: app_id.clone(),
                installation_id,
                private_key_path: path.clone(),
            }),
            (None, None, None) => github
                .token
                .clone()
                .map(GitHubAuth::Token)
                .ok_or_else(|| {
                    ConfigError::Incomplete(
                        "Set GITHUB_TOKEN or the GitHub App id, installation id and private key"
                            .to_string(),
                    )
                }),
            _ => Err(ConfigError::Incomplete(
                "GitHub App configuration needs app id, installation id and private key path"
                    .to_string(),
            )),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.credentials.interval_secs)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.credentials.margin_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
