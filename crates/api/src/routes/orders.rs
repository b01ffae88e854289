//! Order placement, query, cancellation, and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use checkout::{CartLine, OrderLifecycle, PaymentReconciliation, PlaceOrder};
use common::UserId;
use domain::{
    CustomerInfo, Order, OrderStatus, PaymentMethod, ShippingAddress, TrackingInfo,
};
use serde::{Deserialize, Serialize};
use store::{OrderFilter, OrderStore, Page, ProductStore};

use crate::error::ApiError;

use super::{actor_from_headers, parse_order_id};

/// Shared application state accessible from all handlers.
pub struct AppState<O, P> {
    pub lifecycle: OrderLifecycle<O, P>,
    pub reconciliation: PaymentReconciliation<O>,
    pub products: Arc<P>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: uuid::Uuid,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_info: CustomerInfo,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub message: Option<String>,
    pub tracking: Option<TrackingInfo>,
    pub internal_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    /// Admin-only filter; ignored for customers.
    pub customer: Option<uuid::Uuid>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub sku: String,
    pub image_url: Option<String>,
}

#[derive(Serialize)]
pub struct PricingResponse {
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub payment_date: Option<String>,
    pub pix_code: Option<String>,
    pub pix_qr_code: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_code: Option<String>,
}

#[derive(Serialize)]
pub struct TimelineEntryResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub pricing: PricingResponse,
    pub payment: PaymentResponse,
    pub timeline: Vec<TimelineEntryResponse>,
    pub total_items: u32,
    pub created_at: String,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            customer_id: order.customer().to_string(),
            status: order.status().to_string(),
            items: order
                .line_items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    unit_price_cents: item.unit_price.cents(),
                    quantity: item.quantity,
                    size: item.size.clone(),
                    color: item.color.clone(),
                    sku: item.sku.clone(),
                    image_url: item.image_url.clone(),
                })
                .collect(),
            pricing: PricingResponse {
                subtotal_cents: order.pricing().subtotal.cents(),
                shipping_cents: order.pricing().shipping.cents(),
                discount_cents: order.pricing().discount.cents(),
                tax_cents: order.pricing().tax.cents(),
                total_cents: order.pricing().total.cents(),
            },
            payment: PaymentResponse {
                method: order.payment().method.to_string(),
                status: order.payment().status.to_string(),
                transaction_id: order.payment().transaction_id.clone(),
                payment_date: order.payment().payment_date.map(|d| d.to_rfc3339()),
                pix_code: order.payment().artifacts.pix_code.clone(),
                pix_qr_code: order.payment().artifacts.pix_qr_code.clone(),
                boleto_url: order.payment().artifacts.boleto_url.clone(),
                boleto_code: order.payment().artifacts.boleto_code.clone(),
            },
            timeline: order
                .timeline()
                .iter()
                .map(|entry| TimelineEntryResponse {
                    status: entry.status.clone(),
                    message: entry.message.clone(),
                    timestamp: entry.timestamp.to_rfc3339(),
                })
                .collect(),
            total_items: order.total_items(),
            created_at: order.created_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct PaginationResponse {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u32,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub pagination: PaginationResponse,
}

// -- Handlers --

/// POST /orders — place a new order from a cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;

    if req.items.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one item is required".to_string(),
        ));
    }

    let lines = req
        .items
        .into_iter()
        .map(|item| CartLine {
            product_id: item.product_id.into(),
            size: item.size,
            color: item.color,
            quantity: item.quantity,
        })
        .collect();

    let order = state
        .lifecycle
        .place_order(PlaceOrder {
            customer: actor.user_id,
            customer_info: req.customer_info,
            lines,
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            customer_note: req.notes,
        })
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderResponse::from_order(&order)),
    ))
}

/// GET /orders/{id} — load one order; customers see only their own.
#[tracing::instrument(skip(state, headers))]
pub async fn get<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let order_id = parse_order_id(&id)?;

    let order = state.lifecycle.get_order(order_id, actor).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /orders — list orders, newest first, paginated.
#[tracing::instrument(skip(state, headers))]
pub async fn list<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;

    let page = Page::new(query.page.unwrap_or(1), query.limit.unwrap_or(20).min(100));
    let filter = OrderFilter {
        status: query.status,
        customer: query.customer.map(UserId::from),
    };

    let (orders, total) = state.lifecycle.list_orders(actor, filter, page).await?;

    let total_pages = total.div_ceil(u64::from(page.size.max(1)));
    Ok(Json(OrderListResponse {
        orders: orders.iter().map(OrderResponse::from_order).collect(),
        pagination: PaginationResponse {
            current_page: page.number,
            total_pages,
            total_items: total,
            items_per_page: page.size,
        },
    }))
}

/// PATCH /orders/{id}/cancel — cancel an order and restore stock.
#[tracing::instrument(skip(state, headers, req))]
pub async fn cancel<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let order_id = parse_order_id(&id)?;

    let order = state
        .lifecycle
        .cancel_order(order_id, actor, req.reason)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// PATCH /orders/{id}/status — admin-only fulfillment status update.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_status<O, P>(
    State(state): State<Arc<AppState<O, P>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let order_id = parse_order_id(&id)?;

    let order = state
        .lifecycle
        .update_status(
            order_id,
            actor,
            req.status,
            req.message,
            req.tracking,
            req.internal_note,
        )
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}
