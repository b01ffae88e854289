//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{ProductId, UserId};
use domain::{Money, PricingPolicy, Product, Variant};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryOrderStore, InMemoryProductStore, ProductStore};
use tower::ServiceExt;

use api::routes::orders::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState<InMemoryOrderStore, InMemoryProductStore>>,
    product_id: ProductId,
    customer: UserId,
}

/// Builds an app over in-memory stores with one seeded product
/// (price R$ 50.00, size M, stock 5).
async fn setup() -> TestApp {
    let (state, _provider) = api::create_default_state(PricingPolicy::default());
    let app = api::create_app(state.clone(), get_metrics_handle());

    let product_id = ProductId::new();
    state
        .products
        .insert(&Product {
            id: product_id,
            name: "Camiseta Dino".to_string(),
            price: Money::from_cents(5000),
            is_active: true,
            images: vec![],
            variants: vec![Variant {
                size: "M".to_string(),
                stock: 5,
                sku: format!("SKU-{product_id}"),
            }],
        })
        .await
        .unwrap();

    TestApp {
        app,
        state,
        product_id,
        customer: UserId::new(),
    }
}

fn order_body(product_id: ProductId, quantity: u32) -> String {
    serde_json::to_string(&serde_json::json!({
        "customer_info": {
            "name": "Ana Souza",
            "email": "ana@example.com",
            "phone": "+55 11 99999-0000"
        },
        "items": [{
            "product_id": product_id.to_string(),
            "size": "M",
            "color": "azul",
            "quantity": quantity
        }],
        "shipping_address": {
            "street": "Rua das Flores",
            "number": "100",
            "neighborhood": "Centro",
            "city": "São Paulo",
            "state": "SP",
            "zip_code": "01000-000"
        },
        "payment_method": "pix"
    }))
    .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn place_order(bed: &TestApp, quantity: u32) -> serde_json::Value {
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(order_body(bed.product_id, quantity)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_health_check() {
    let bed = setup().await;

    let response = bed
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order_requires_identity() {
    let bed = setup().await;

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .body(Body::from(order_body(bed.product_id, 1)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_order_computes_pricing_and_reserves_stock() {
    let bed = setup().await;

    let created = place_order(&bed, 2).await;

    assert_eq!(created["status"], "pending");
    assert_eq!(created["pricing"]["subtotal_cents"], 10000);
    assert_eq!(created["pricing"]["shipping_cents"], 1500);
    assert_eq!(created["pricing"]["total_cents"], 11500);
    assert_eq!(created["total_items"], 2);
    assert!(created["order_number"].as_str().unwrap().starts_with("PM-"));

    assert_eq!(
        bed.state.products.stock(bed.product_id, "M").await.unwrap(),
        3
    );
}

#[tokio::test]
async fn test_get_order_enforces_ownership() {
    let bed = setup().await;
    let created = place_order(&bed, 1).await;
    let order_id = created["id"].as_str().unwrap();

    // Owner reads it back.
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .header("x-user-id", bed.customer.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A different customer is rejected.
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .header("x-user-id", UserId::new().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_insufficient_stock_is_rejected() {
    let bed = setup().await;

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(order_body(bed.product_id, 9)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("insufficient stock")
    );
    assert_eq!(
        bed.state.products.stock(bed.product_id, "M").await.unwrap(),
        5
    );
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let bed = setup().await;
    let created = place_order(&bed, 2).await;
    let order_id = created["id"].as_str().unwrap();
    assert_eq!(
        bed.state.products.stock(bed.product_id, "M").await.unwrap(),
        3
    );

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/orders/{order_id}/cancel"))
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(r#"{"reason":"changed my mind"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "cancelled");
    assert_eq!(
        bed.state.products.stock(bed.product_id, "M").await.unwrap(),
        5
    );
}

#[tokio::test]
async fn test_status_update_is_admin_only() {
    let bed = setup().await;
    let created = place_order(&bed, 1).await;
    let order_id = created["id"].as_str().unwrap();

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/orders/{order_id}/status"))
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(r#"{"status":"confirmed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/orders/{order_id}/status"))
                .header("content-type", "application/json")
                .header("x-user-id", UserId::new().to_string())
                .header("x-user-role", "admin")
                .body(Body::from(r#"{"status":"confirmed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "confirmed");
}

#[tokio::test]
async fn test_pix_payment_flow() {
    let bed = setup().await;
    let created = place_order(&bed, 2).await;
    let order_id = created["id"].as_str().unwrap();
    let total = created["pricing"]["total_cents"].as_i64().unwrap();

    // Attempt: PIX code issued, payment stays pending.
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/payments/{order_id}"))
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(
                    serde_json::json!({ "method": "pix", "amount_cents": total }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let attempt = json_body(response).await;
    assert_eq!(attempt["payment_status"], "pending");
    assert!(attempt["pix_code"].as_str().is_some());
    let transaction_id = attempt["transaction_id"].as_str().unwrap().to_string();

    // Provider callback confirms the payment.
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/payments/{order_id}/result"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "success": true,
                        "transaction_id": transaction_id,
                        "provider_response": { "paid": true }
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["payment_status"], "paid");
    assert_eq!(result["order_status"], "confirmed");

    // Status endpoint agrees.
    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/payments/{order_id}/status"))
                .header("x-user-id", bed.customer.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status["payment_status"], "paid");
    assert_eq!(status["order_status"], "confirmed");
}

#[tokio::test]
async fn test_payment_amount_mismatch_is_rejected() {
    let bed = setup().await;
    let created = place_order(&bed, 1).await;
    let order_id = created["id"].as_str().unwrap();

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/payments/{order_id}"))
                .header("content-type", "application/json")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::from(
                    serde_json::json!({ "method": "pix", "amount_cents": 1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("does not match"));
}

#[tokio::test]
async fn test_list_orders_paginates() {
    let bed = setup().await;
    for _ in 0..3 {
        place_order(&bed, 1).await;
    }

    let response = bed
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/orders?page=1&limit=2")
                .header("x-user-id", bed.customer.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["orders"].as_array().unwrap().len(), 2);
    assert_eq!(json["pagination"]["total_items"], 3);
    assert_eq!(json["pagination"]["total_pages"], 2);
}
