use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::error::CacheError;
use crate::protocol::{
    codes, AckResponse, ContextResponse, ErrorResponse, ExhaustedResponse, KeyRequest,
    StoreRequest,
};
use crate::store::ContextCache;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Testsmith Cache API",
        version = "0.1.0",
        description = "Generation context cache with per-branch retry budgets"
    ),
    paths(health_check, set_context, get_context, update_context, delete_context, is_exhausted),
    components(schemas(
        HealthResponse,
        KeyRequest,
        StoreRequest,
        AckResponse,
        ContextResponse,
        ExhaustedResponse,
        ErrorResponse,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "cache", description = "Context cache operations"),
    )
)]
pub struct CacheApiDoc;

#[derive(Clone)]
pub struct CacheState {
    pub cache: Arc<dyn ContextCache>,
}

pub fn cache_router(cache: Arc<dyn ContextCache>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_spec))
        .route("/v1/cache/set", post(set_context))
        .route("/v1/cache/get", post(get_context))
        .route("/v1/cache/update", post(update_context))
        .route("/v1/cache/delete", post(delete_context))
        .route("/v1/cache/exhausted", post(is_exhausted))
        .layer(TraceLayer::new_for_http())
        .with_state(CacheState { cache })
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, error_type, value) = match &self {
            CacheError::NotFound(_) => (StatusCode::NOT_FOUND, codes::NOT_FOUND, None),
            CacheError::CorruptBudget { value, .. } => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::CORRUPT_BUDGET,
                    Some(value.clone()),
                )
            }
            err if err.is_transient() => {
                tracing::warn!("Cache backend unavailable: {:?}", err);
                (StatusCode::SERVICE_UNAVAILABLE, codes::UNAVAILABLE, None)
            }
            err => {
                tracing::error!("Cache error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            value,
        });

        (status, body).into_response()
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(CacheApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/v1/cache/set",
    request_body = StoreRequest,
    responses(
        (status = 200, description = "Context stored and budget reset", body = AckResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "cache"
)]
pub async fn set_context(
    State(state): State<CacheState>,
    Json(request): Json<StoreRequest>,
) -> Result<Json<AckResponse>, CacheError> {
    state.cache.put(&request.key, &request.value).await?;
    Ok(Json(AckResponse { ok: true }))
}

#[utoipa::path(
    post,
    path = "/v1/cache/get",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Cached context; one retry credit consumed", body = ContextResponse),
        (status = 404, description = "Key was never stored", body = ErrorResponse),
        (status = 500, description = "Retry budget is corrupt", body = ErrorResponse)
    ),
    tag = "cache"
)]
pub async fn get_context(
    State(state): State<CacheState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<ContextResponse>, CacheError> {
    let value = state.cache.get(&request.key).await?;
    Ok(Json(ContextResponse { value }))
}

#[utoipa::path(
    post,
    path = "/v1/cache/update",
    request_body = StoreRequest,
    responses(
        (status = 200, description = "Context replaced, budget kept", body = AckResponse),
        (status = 404, description = "Key was never stored", body = ErrorResponse)
    ),
    tag = "cache"
)]
pub async fn update_context(
    State(state): State<CacheState>,
    Json(request): Json<StoreRequest>,
) -> Result<Json<AckResponse>, CacheError> {
    state.cache.update(&request.key, &request.value).await?;
    Ok(Json(AckResponse { ok: true }))
}

#[utoipa::path(
    post,
    path = "/v1/cache/delete",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Context and budget removed", body = AckResponse)
    ),
    tag = "cache"
)]
pub async fn delete_context(
    State(state): State<CacheState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<AckResponse>, CacheError> {
    state.cache.delete(&request.key).await?;
    Ok(Json(AckResponse { ok: true }))
}

#[utoipa::path(
    post,
    path = "/v1/cache/exhausted",
    request_body = KeyRequest,
    responses(
        (status = 200, description = "Whether the retry budget is used up", body = ExhaustedResponse),
        (status = 404, description = "Key was never stored", body = ErrorResponse),
        (status = 500, description = "Retry budget is corrupt", body = ErrorResponse)
    ),
    tag = "cache"
)]
pub async fn is_exhausted(
    State(state): State<CacheState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<ExhaustedResponse>, CacheError> {
    let exhausted = state.cache.is_exhausted(&request.key).await?;
    Ok(Json(ExhaustedResponse { exhausted }))
}
