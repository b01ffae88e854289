//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::OrderError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Service-layer error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    let status = match &err {
        CheckoutError::OrderNotFound(_)
        | CheckoutError::ProductNotFound(_)
        | CheckoutError::VariantNotFound { .. } => StatusCode::NOT_FOUND,
        CheckoutError::Forbidden(_) => StatusCode::FORBIDDEN,
        CheckoutError::InsufficientStock(_)
        | CheckoutError::AmountMismatch { .. }
        | CheckoutError::UnsupportedMethod(_)
        | CheckoutError::Pricing(_) => StatusCode::BAD_REQUEST,
        CheckoutError::Order(OrderError::InvalidTransition { .. }) => StatusCode::CONFLICT,
        CheckoutError::Order(_) => StatusCode::BAD_REQUEST,
        CheckoutError::ProviderFailure(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::Store(StoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
        CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "storage error");
    }
    (status, err.to_string())
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
