use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use enrichment::EnrichmentError;
use market_data::ProviderError;
use persistence::StoreError;
use serde_json::json;
use thiserror::Error;

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<EnrichmentError> for AppError {
    fn from(err: EnrichmentError) -> Self {
        tracing::error!(error = %err, "Search failed");
        AppError::Upstream("Failed to fetch listings".into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store request failed");
        AppError::ServiceUnavailable("Listing store unavailable".into())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(what) => AppError::NotFound(what),
            other => {
                tracing::error!(error = %other, "Provider request failed");
                AppError::ServiceUnavailable("Vehicle data provider unavailable".into())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::RateLimitExceeded(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, msg, "RATE_LIMIT_EXCEEDED")
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "UPSTREAM_ERROR"),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
