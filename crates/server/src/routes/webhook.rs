use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::FlowOutcome;
use testsmith_core::InboundEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::AppState;

pub const EVENT_HEADER: &str = "x-github-event";

/// Handles a GitHub webhook delivery.
///
/// The flow runs inside the request. If the client goes away the handler
/// future is dropped, which cancels every stage of the flow.
#[utoipa::path(
    post,
    path = "/webhook",
    params(
        ("X-GitHub-Event" = String, Header, description = "Event kind, e.g. pull_request or workflow_run")
    ),
    request_body(content = String, description = "Raw webhook payload", content_type = "application/json"),
    responses(
        (status = 202, description = "Event handled", body = FlowOutcome),
        (status = 204, description = "Event ignored"),
        (status = 400, description = "Malformed payload", body = crate::error::ErrorResponse),
        (status = 429, description = "Retry budget exhausted", body = FlowOutcome),
        (status = 500, description = "Flow failed", body = crate::error::ErrorResponse)
    ),
    tag = "webhook"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let kind = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing X-GitHub-Event header".to_string()))?;

    let event = InboundEvent::parse(kind, &body)?;
    if let InboundEvent::Unsupported { name } = &event {
        debug!(event = %name, "Ignoring unsupported event");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.orchestrator.handle(event, cancel).await?;
    Ok(respond(outcome))
}

fn respond(outcome: FlowOutcome) -> Response {
    match outcome {
        FlowOutcome::Ignored { reason } => {
            debug!(reason = %reason, "Event ignored");
            StatusCode::NO_CONTENT.into_response()
        }
        FlowOutcome::RetryExhausted { .. } => {
            info!(outcome = outcome.name(), "Retry budget exhausted");
            (StatusCode::TOO_MANY_REQUESTS, Json(outcome)).into_response()
        }
        outcome => (StatusCode::ACCEPTED, Json(outcome)).into_response(),
    }
}
