//! API error types.
//!
//! Only transport faults end up here. Per-request domain failures (bad
//! image, no hand, engine error) are a normal 200 prediction body.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service not ready: {0}")]
    NotReady(String),

    #[error("Prediction timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::NotReady(_) => "not_ready",
            ApiError::Timeout(_) => "timeout",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal",
        }
    }
}

/// Error body: `{"detail": ..., "code": ...}`.
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) detail: String,
    pub(crate) code: &'static str,
}

/// Machine-readable code, also stored in the extensions of every error
/// response so later layers can recognize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    /// Generic text that replaces the detail in production, for codes whose
    /// detail can reveal internals.
    pub fn redacted_detail(&self) -> Option<&'static str> {
        match self.0 {
            "internal" => Some("An internal error occurred"),
            "not_ready" => Some("Service is not ready"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let body = ErrorResponse {
            detail: self.to_string(),
            code,
        };

        let mut response = match self {
            ApiError::RateLimited => (status, [("Retry-After", "1")], Json(body)).into_response(),
            _ => (status, Json(body)).into_response(),
        };
        response.extensions_mut().insert(ErrorCode(code));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_ready("x").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Timeout(Duration::from_secs(30)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = ApiError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Prediction timed out after 1.5s");
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "1");
    }

    #[test]
    fn test_response_carries_error_code() {
        let response = ApiError::internal("disk on fire").into_response();
        let code = response.extensions().get::<ErrorCode>().copied();
        assert_eq!(code, Some(ErrorCode("internal")));
        assert!(code.unwrap().redacted_detail().is_some());
    }

    #[test]
    fn test_client_errors_are_never_redacted() {
        assert_eq!(ErrorCode("bad_request").redacted_detail(), None);
        assert_eq!(ErrorCode("timeout").redacted_detail(), None);
    }
}
