//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use axum::http::HeaderMap;
use common::{Actor, OrderId, Role, UserId};

use crate::error::ApiError;

/// Resolves the caller identity from the headers set by the upstream
/// auth middleware.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))?;
    let user_id: UserId = user_id
        .parse()
        .map_err(|e| ApiError::Unauthorized(format!("invalid x-user-id: {e}")))?;

    let role = match headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
        Some(raw) => raw.parse::<Role>().map_err(ApiError::Unauthorized)?,
        None => Role::Customer,
    };

    Ok(Actor { user_id, role })
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from(uuid))
}
