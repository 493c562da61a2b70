//! HTTP error envelope for the intake API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::orchestrator::IntakeError;

/// Central error type for the intake HTTP surface
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Order store unavailable")]
    StoreUnavailable,

    #[error("Order queue unavailable")]
    QueueUnavailable,

    #[error("A request with this idempotency key is still in progress; retry later")]
    RequestInProgress,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Request timed out")]
    Timeout,

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::StoreUnavailable => "store_unavailable",
            AppError::QueueUnavailable => "queue_unavailable",
            AppError::RequestInProgress => "request_in_progress",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::Timeout => "timeout",
            AppError::InternalError(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable | AppError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RequestInProgress => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Invalid(e) => AppError::InvalidRequest(e.to_string()),
            // Dependency detail stays in the logs
            IntakeError::StoreUnavailable(_) => AppError::StoreUnavailable,
            IntakeError::QueueUnavailable(_) => AppError::QueueUnavailable,
            IntakeError::InProgress { .. } => AppError::RequestInProgress,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::InternalError(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use intake_types::errors::{LedgerError, PublishError, ValidationError};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_request_envelope() {
        let err = AppError::from(IntakeError::Invalid(ValidationError::NonPositivePrice));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().unwrap().contains("price"));
    }

    #[tokio::test]
    async fn test_dependency_errors_hide_detail() {
        let err = AppError::from(IntakeError::StoreUnavailable(LedgerError::Unavailable {
            reason: "password authentication failed for user intake".to_string(),
        }));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "store_unavailable");
        assert!(!body["message"].as_str().unwrap().contains("password"));

        let err = AppError::from(IntakeError::QueueUnavailable(PublishError::Delivery {
            topic: "orders.in".to_string(),
            reason: "broker down".to_string(),
        }));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "queue_unavailable");
    }

    #[tokio::test]
    async fn test_in_progress_is_conflict() {
        let err = AppError::from(IntakeError::InProgress {
            existing: intake_types::ids::OrderId::new(),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "request_in_progress");
    }

    #[tokio::test]
    async fn test_timeout_and_internal() {
        let (status, body) = body_json(AppError::Timeout).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "timeout");

        let (status, body) = body_json(AppError::InternalError(anyhow::anyhow!("task panicked"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "Internal server error");
    }
}
