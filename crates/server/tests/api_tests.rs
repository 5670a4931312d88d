use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use cache::{cache_router, create_pool, run_migrations, ContextCache, SqliteContextStore};
use github::{StaticTokenExchange, TokenManager};
use serde_json::{json, Value};
use server::config::ServiceConfig;
use server::{create_router, state::AppState};
use tempfile::TempDir;
use testsmith_core::{CacheKey, GenerationContext, RepoSlug, SourceFile, TestFile};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BRANCH: &str = "tests/testsmith-0a1b2c3d";

fn event_header() -> HeaderName {
    HeaderName::from_static("x-github-event")
}

struct TestEnv {
    server: TestServer,
    store: SqliteContextStore,
    github: MockServer,
    engine: MockServer,
    _dir: TempDir,
}

async fn spawn_cache_service(store: SqliteContextStore) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");
    let app = cache_router(Arc::new(store));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Cache service failed");
    });
    format!("http://{}", addr)
}

async fn setup() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_url = format!("sqlite:{}", dir.path().join("cache.db").display());
    let pool = create_pool(&db_url).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    let store = SqliteContextStore::new(pool);

    let github = MockServer::start().await;
    let engine = MockServer::start().await;

    let mut config = ServiceConfig::default();
    config.github.api_base = github.uri();
    config.generation_url = engine.uri();
    config.cache_url = spawn_cache_service(store.clone()).await;

    let tokens = TokenManager::new(Arc::new(StaticTokenExchange::new("ghs_test")));
    let state = AppState::from_config(&config, tokens).expect("Failed to build state");
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");

    TestEnv {
        server,
        store,
        github,
        engine,
        _dir: dir,
    }
}

fn key() -> CacheKey {
    CacheKey::for_branch(&RepoSlug::new("octo", "demo"), BRANCH)
}

fn cached_context() -> GenerationContext {
    GenerationContext::new(
        vec![SourceFile::new("utils.py", "def add(a, b): return a + b")],
        vec![TestFile::new("test_utils", "/tests/test_utils.py", "utils.py", "v1")],
    )
}

fn repository() -> Value {
    json!({ "name": "demo", "full_name": "octo/demo", "owner": { "login": "octo" } })
}

fn workflow_run(name: &str, conclusion: &str, jobs_url: &str) -> Value {
    json!({
        "action": "completed",
        "workflow_run": {
            "name": name,
            "conclusion": conclusion,
            "head_branch": BRANCH,
            "jobs_url": jobs_url,
            "repository": repository()
        }
    })
}

fn pull_request(action: &str, merged: bool) -> Value {
    json!({
        "action": action,
        "number": 7,
        "pull_request": {
            "number": 7,
            "merged": merged,
            "merge_commit_sha": "abc123",
            "body": null,
            "base": { "ref": "testing" }
        },
        "repository": repository()
    })
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let env = setup().await;

        let response = env.server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "testsmith");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let env = setup().await;

        let body: Value = env.server.get("/openapi.json").await.json();

        assert!(body["paths"]["/webhook"]["post"].is_object());
    }
}

mod intake {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_event_is_no_content() {
        let env = setup().await;

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("push"))
            .json(&json!({ "ref": "refs/heads/main" }))
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_missing_event_header() {
        let env = setup().await;

        let response = env
            .server
            .post("/webhook")
            .json(&pull_request("closed", true))
            .expect_failure()
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let env = setup().await;

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("pull_request"))
            .json(&json!({ "action": "closed" }))
            .expect_failure()
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_unmerged_pull_request_is_ignored() {
        let env = setup().await;

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("pull_request"))
            .json(&pull_request("closed", false))
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
        assert!(env.engine.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_untracked_workflow_is_ignored() {
        let env = setup().await;
        env.store.put(&key(), &cached_context()).await.unwrap();

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("workflow_run"))
            .json(&workflow_run("Lint", "success", "https://example.invalid/jobs"))
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
        assert_eq!(env.store.remaining(&key()).await.unwrap(), 3);
    }
}

mod workflow {
    use super::*;

    fn jobs_url(env: &TestEnv) -> String {
        format!("{}/repos/octo/demo/actions/runs/1/jobs", env.github.uri())
    }

    #[tokio::test]
    async fn test_success_clears_cache() {
        let env = setup().await;
        env.store.put(&key(), &cached_context()).await.unwrap();

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("workflow_run"))
            .json(&workflow_run("Run Tests in Directory", "success", &jobs_url(&env)))
            .await;

        response.assert_status(StatusCode::ACCEPTED);
        let body: Value = response.json();
        assert_eq!(body["outcome"], "cache_cleared");
        assert!(env.store.get(&key()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_too_many_requests() {
        let env = setup().await;
        env.store.put(&key(), &cached_context()).await.unwrap();
        for _ in 0..3 {
            env.store.get(&key()).await.unwrap();
        }

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("workflow_run"))
            .json(&workflow_run("Run Tests in Directory", "failure", &jobs_url(&env)))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let body: Value = response.json();
        assert_eq!(body["outcome"], "retry_exhausted");
        assert_eq!(body["branch"], BRANCH);
        assert!(env.github.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_failure_without_cached_context() {
        let env = setup().await;

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("workflow_run"))
            .json(&workflow_run("Run Tests in Directory", "failure", &jobs_url(&env)))
            .await;

        response.assert_status(StatusCode::ACCEPTED);
        let body: Value = response.json();
        assert_eq!(body["outcome"], "not_tracked");
    }

    #[tokio::test]
    async fn test_engine_failure_consumes_one_credit() {
        let env = setup().await;
        env.store.put(&key(), &cached_context()).await.unwrap();

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/actions/runs/1/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "jobs": [{ "id": 99 }]
            })))
            .mount(&env.github)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/actions/jobs/99/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "2024-05-01T10:00:00.0000000Z FAILED tests/test_utils.py::test_add\n",
            ))
            .mount(&env.github)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/regenerate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&env.engine)
            .await;

        let response = env
            .server
            .post("/webhook")
            .add_header(event_header(), HeaderValue::from_static("workflow_run"))
            .json(&workflow_run("Run Tests in Directory", "failure", &jobs_url(&env)))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "generation_error");
        assert_eq!(env.store.remaining(&key()).await.unwrap(), 2);
    }
}
