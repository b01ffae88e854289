//! HTTP API server for the storefront order core.
//!
//! Exposes order placement, queries, cancellation, admin status
//! updates, and payment endpoints over the checkout services, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use checkout::{MockPaymentProvider, OrderLifecycle, PaymentReconciliation, mock_registry};
use domain::PricingPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryOrderStore, InMemoryProductStore, OrderStore, ProductStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O, P>(state: Arc<AppState<O, P>>, metrics_handle: PrometheusHandle) -> Router
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<O, P>))
        .route("/orders", get(routes::orders::list::<O, P>))
        .route("/orders/{id}", get(routes::orders::get::<O, P>))
        .route("/orders/{id}/cancel", patch(routes::orders::cancel::<O, P>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<O, P>),
        )
        .route("/payments/{order_id}", post(routes::payments::attempt::<O, P>))
        .route(
            "/payments/{order_id}/result",
            post(routes::payments::result::<O, P>),
        )
        .route(
            "/payments/{order_id}/status",
            get(routes::payments::status::<O, P>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services over the given stores with the mock payment
/// provider registered for every method.
pub fn create_state<O, P>(
    orders: Arc<O>,
    products: Arc<P>,
    pricing: PricingPolicy,
) -> (Arc<AppState<O, P>>, MockPaymentProvider)
where
    O: OrderStore + 'static,
    P: ProductStore + 'static,
{
    let lifecycle = OrderLifecycle::new(orders.clone(), products.clone(), pricing);
    let (registry, provider) = mock_registry();
    let reconciliation = PaymentReconciliation::new(orders, registry);

    (
        Arc::new(AppState {
            lifecycle,
            reconciliation,
            products,
        }),
        provider,
    )
}

/// Creates application state backed by in-memory stores.
pub fn create_default_state(
    pricing: PricingPolicy,
) -> (
    Arc<AppState<InMemoryOrderStore, InMemoryProductStore>>,
    MockPaymentProvider,
) {
    let orders = Arc::new(InMemoryOrderStore::new());
    let products = Arc::new(InMemoryProductStore::new());
    create_state(orders, products, pricing)
}
