use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cache::{cache_router, SqliteContextStore};
use clap::{Parser, Subcommand};
use github::{CredentialExchange, GitHubAppExchange, StaticTokenExchange, TokenManager};
use server::config::{GitHubAuth, ServiceConfig};
use server::{create_router, state::AppState};
use testsmith_core::RepoSettings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "testsmith")]
#[command(about = "Generates tests for merged pull requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML service configuration
    #[arg(short, long, env = "TESTSMITH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook service
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the context cache service
    CacheService {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        database_url: Option<String>,
    },
    /// Validate a repository settings file
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Serve { port: None });
    if let Commands::CheckConfig { path } = &command {
        return check_config(path).await;
    }

    init_tracing(cli.json_logs);
    let mut config = ServiceConfig::load(cli.config.as_deref())?;

    match command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Commands::CacheService { port, database_url } => {
            if let Some(port) = port {
                config.cache_service.port = port;
            }
            if let Some(url) = database_url {
                config.cache_service.database_url = url;
            }
            cache_service(config).await
        }
        Commands::CheckConfig { .. } => Ok(()),
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    let tokens = token_manager(&config).await?;

    let cancel = CancellationToken::new();
    let refresh = tokens.spawn_proactive_refresh(
        config.refresh_interval(),
        chrono::Duration::from_std(config.refresh_margin())?,
        cancel.clone(),
    );

    let state = AppState::from_config(&config, tokens)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Webhook service listening on {}", listener.local_addr()?);
    tracing::info!(
        generation = %config.generation_url,
        cache = %config.cache_url,
        workflow = %config.workflow_name,
        "Collaborators"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    refresh.await?;
    Ok(())
}

async fn cache_service(config: ServiceConfig) -> Result<()> {
    let database_url = &config.cache_service.database_url;
    let pool = cache::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;
    cache::run_migrations(&pool).await?;
    tracing::info!("Cache database: {}", database_url);

    let app = cache_router(Arc::new(SqliteContextStore::new(pool)));

    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.cache_service.port)).await?;
    tracing::info!("Cache service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn check_config(path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let settings = RepoSettings::from_yaml(&content)?;

    println!("{} is valid", path.display());
    println!("  testing branch:  {}", settings.testing_branch());
    println!("  framework:       {}", settings.configuration.testing_framework);
    println!("  test directory:  {}", settings.configuration.test_directory);
    println!("  caching:         {}", if settings.caching_enabled() { "on" } else { "off" });
    Ok(())
}

async fn token_manager(config: &ServiceConfig) -> Result<TokenManager> {
    let exchange: Arc<dyn CredentialExchange> = match config.github_auth()? {
        GitHubAuth::App {
            app_id,
            installation_id,
            private_key_path,
        } => {
            let pem = tokio::fs::read(&private_key_path)
                .await
                .with_context(|| format!("Failed to read {}", private_key_path.display()))?;
            tracing::info!(app_id = %app_id, installation_id, "Authenticating as GitHub App");
            Arc::new(GitHubAppExchange::new(
                config.github.api_base.clone(),
                app_id,
                installation_id,
                &pem,
            )?)
        }
        GitHubAuth::Token(token) => {
            tracing::info!("Authenticating with a static token");
            Arc::new(StaticTokenExchange::new(token))
        }
    };

    Ok(TokenManager::new(exchange))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "testsmith=info,server=info,orchestrator=info,github=info,cache=info,tower_http=info".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cache_service() {
        let cli = Cli::parse_from([
            "testsmith",
            "cache-service",
            "--port",
            "9090",
            "--database-url",
            "sqlite::memory:",
        ]);
        assert!(matches!(
            cli.command,
            Some(Commands::CacheService { port: Some(9090), database_url: Some(ref url) }) if url == "sqlite::memory:"
        ));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["testsmith", "serve", "--config", "/etc/testsmith.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/testsmith.toml")));
    }

    #[tokio::test]
    async fn test_check_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("testsmith-config.yml");
        std::fs::write(&path, "configuration:\n  testing-branch: qa\n").unwrap();

        assert!(check_config(&path).await.is_ok());

        std::fs::write(&path, "configuration:\n  testing-branch: ''\n").unwrap();
        assert!(check_config(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_token_manager_from_static_token() {
        let mut config = ServiceConfig::default();
        config.github.token = Some("ghs_test".to_string());

        let tokens = token_manager(&config).await.unwrap();

        assert_eq!(tokens.token().await.unwrap(), "ghs_test");
    }
}
