//! Payment attempt, provider-result, and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::PaymentOutcome;
use domain::{Money, PaymentMethod};
use serde::{Deserialize, Serialize};
use store::{OrderStore, ProductStore};

use crate::error::ApiError;

use super::orders::AppState;
use super::{actor_from_headers, parse_order_id};

// -- Request types --

#[derive(Deserialize)]
pub struct PaymentAttemptRequest {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Opaque method-specific input (card token, sender hash, ...).
    #[serde(default)]
    pub input: serde_json::Value,
}

#[derive(Deserialize)]
pub struct PaymentResultRequest {
    pub success: bool,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub provider_response: serde_json::Value,
    pub failure_message: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentAttemptResponse {
    pub order_status: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub amount_cents: i64,
    pub pix_code: Option<String>,
    pub pix_qr_code: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_code: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub order_status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub pix_code: Option<String>,
    pub pix_qr_code: Option<String>,
    pub boleto_url: Option<String>,
}

// -- Handlers --

/// POST /payments/{order_id} — start a payment attempt for an order.
#[tracing::instrument(skip(state, headers, req))]
pub async fn attempt<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
    Json(req): Json<PaymentAttemptRequest>,
) -> Result<Json<PaymentAttemptResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let order_id = parse_order_id(&order_id)?;

    let order = state
        .reconciliation
        .record_attempt(
            order_id,
            actor,
            req.method,
            Money::from_cents(req.amount_cents),
            req.input,
        )
        .await?;

    let payment = order.payment();
    Ok(Json(PaymentAttemptResponse {
        order_status: order.status().to_string(),
        payment_status: payment.status.to_string(),
        transaction_id: payment.transaction_id.clone(),
        amount_cents: order.pricing().total.cents(),
        pix_code: payment.artifacts.pix_code.clone(),
        pix_qr_code: payment.artifacts.pix_qr_code.clone(),
        boleto_url: payment.artifacts.boleto_url.clone(),
        boleto_code: payment.artifacts.boleto_code.clone(),
    }))
}

/// POST /payments/{order_id}/result — provider callback with the final
/// verdict. Idempotent per transaction id; signature verification
/// belongs to the upstream gateway middleware.
#[tracing::instrument(skip(state, req))]
pub async fn result<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    Path(order_id): Path<String>,
    Json(req): Json<PaymentResultRequest>,
) -> Result<Json<PaymentStatusResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let order_id = parse_order_id(&order_id)?;

    let order = state
        .reconciliation
        .record_result(
            order_id,
            PaymentOutcome {
                success: req.success,
                transaction_id: req.transaction_id,
                provider_response: req.provider_response,
                failure_message: req.failure_message,
            },
        )
        .await?;

    Ok(Json(status_response(&order)))
}

/// GET /payments/{order_id}/status — payment state of an order.
#[tracing::instrument(skip(state, headers))]
pub async fn status<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let order_id = parse_order_id(&order_id)?;

    let order = state.lifecycle.get_order(order_id, actor).await?;
    Ok(Json(status_response(&order)))
}

fn status_response(order: &domain::Order) -> PaymentStatusResponse {
    let payment = order.payment();
    PaymentStatusResponse {
        order_status: order.status().to_string(),
        payment_status: payment.status.to_string(),
        payment_method: payment.method.to_string(),
        transaction_id: payment.transaction_id.clone(),
        pix_code: payment.artifacts.pix_code.clone(),
        pix_qr_code: payment.artifacts.pix_qr_code.clone(),
        boleto_url: payment.artifacts.boleto_url.clone(),
    }
}
