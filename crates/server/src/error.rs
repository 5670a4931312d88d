use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use testsmith_core::EventParseError;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Orchestrator(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::Orchestrator(err) => {
                tracing::error!("Flow failed: {}", err);
                match err {
                    OrchestratorError::InvalidInput(e) => {
                        (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
                    }
                    OrchestratorError::Cancelled => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "cancelled",
                        err.to_string(),
                    ),
                    OrchestratorError::Repository(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "repository_error", err.to_string())
                    }
                    OrchestratorError::Cache(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "cache_error", err.to_string())
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "generation_error", err.to_string()),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

impl From<EventParseError> for AppError {
    fn from(err: EventParseError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<github::GitHubError> for AppError {
    fn from(err: github::GitHubError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<cache::CacheError> for AppError {
    fn from(err: cache::CacheError) -> Self {
        AppError::Internal(err.to_string())
    }
}
