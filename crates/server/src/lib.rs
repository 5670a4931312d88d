pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "testsmith",
        version = "0.1.0",
        description = "Generates tests for merged pull requests and retries them on failed runs"
    ),
    paths(routes::health_check, routes::receive_webhook),
    components(schemas(
        routes::HealthResponse,
        error::ErrorResponse,
        orchestrator::FlowOutcome,
        orchestrator::CacheOutcome,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "webhook", description = "GitHub webhook intake"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/webhook", post(routes::receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
