use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use intake_types::ids::IdempotencyKey;
use tracing::Instrument;

use crate::error::AppError;
use crate::models::CreateOrderRequest;
use crate::observability::record_order_outcome;
use crate::orchestrator::IntakeError;
use crate::state::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
/// Set on responses served from an earlier request with the same key
pub const REPLAYED_HEADER: &str = "idempotent-replayed";

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let started = Instant::now();

    let Json(request) = payload.map_err(|rejection| {
        record_order_outcome("bad_request", None);
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::InvalidRequest(rejection.body_text())
    })?;
    let key = idempotency_key(&headers).inspect_err(|_| record_order_outcome("bad_request", None))?;

    // The intake runs to completion even if the caller stops waiting, so a
    // pending write is never abandoned halfway.
    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(
        async move { orchestrator.submit(request, key).await }.instrument(tracing::Span::current()),
    );

    let outcome = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => {
            return Err(AppError::InternalError(anyhow::anyhow!("intake task failed: {join_error}")));
        }
        Err(_) => {
            record_order_outcome("timeout", None);
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Order intake exceeded request deadline; continuing in background"
            );
            return Err(AppError::Timeout);
        }
    };

    match outcome {
        Ok(submission) if submission.replayed => {
            record_order_outcome("idempotent", None);
            let mut response = Json(submission.response).into_response();
            response
                .headers_mut()
                .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
            Ok(response)
        }
        Ok(submission) => {
            record_order_outcome("accepted", Some(started.elapsed()));
            tracing::info!(order_id = %submission.response.order_id, "Order accepted");
            Ok(Json(submission.response).into_response())
        }
        Err(e) => {
            let result = match &e {
                IntakeError::Invalid(_) => "invalid",
                IntakeError::StoreUnavailable(_) => "db_error",
                IntakeError::QueueUnavailable(_) => "kafka_error",
                IntakeError::InProgress { .. } => "in_progress",
            };
            record_order_outcome(result, None);
            Err(e.into())
        }
    }
}

/// Absent or empty header means no key
fn idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>, AppError> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| AppError::InvalidRequest("Idempotency-Key must be visible ASCII".to_string()))?;
    IdempotencyKey::parse(raw).map_err(|e| AppError::InvalidRequest(e.to_string()))
}
