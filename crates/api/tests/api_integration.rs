//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use common::{BuyerId, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, InventoryItem, Store};
use tower::ServiceExt;

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

async fn setup() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::with_items(vec![
        InventoryItem::new("A", "Widget", "tools", Money::from_cents(1000), 5),
        InventoryItem::new("B", "Gadget", "tools", Money::from_cents(250), 1),
    ])
    .await;
    let state = Arc::new(AppState::new(store.clone(), "memory"));
    (api::create_app(state, get_metrics_handle()), store)
}

fn request(method: &str, uri: &str, user: Option<(BuyerId, &str)>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = user {
        builder = builder
            .header("x-user-id", user_id.to_string())
            .header("x-user-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn cart(lines: &[(&str, u32)]) -> serde_json::Value {
    let items: Vec<_> = lines
        .iter()
        .map(|(id, qty)| serde_json::json!({ "item_id": id, "quantity": qty }))
        .collect();
    serde_json::json!({ "items": items })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn test_place_order() {
    let (app, store) = setup().await;
    let buyer = BuyerId::new();

    let response = app
        .oneshot(request(
            "POST",
            "/orders",
            Some((buyer, "buyer")),
            Some(cart(&[("A", 3)])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["buyer_id"], buyer.to_string());
    assert_eq!(json["total_cents"], 3000);
    assert_eq!(json["lines"][0]["item_id"], "A");
    assert_eq!(json["lines"][0]["unit_price_cents"], 1000);
    assert_eq!(json["lines"][0]["line_total_cents"], 3000);

    let item = store.get_item(&"A".into()).await.unwrap().unwrap();
    assert_eq!(item.quantity_on_hand, 2);
}

#[tokio::test]
async fn test_place_order_requires_identity() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request("POST", "/orders", None, Some(cart(&[("A", 1)]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_user_id_is_unauthorized() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header("x-user-id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_cart_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/orders",
            Some((BuyerId::new(), "buyer")),
            Some(cart(&[])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "empty_cart");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/orders",
            Some((BuyerId::new(), "buyer")),
            Some(serde_json::json!({ "items": [{ "item_id": "A", "quantity": -1 }] })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let (app, store) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/orders",
            Some((BuyerId::new(), "buyer")),
            Some(cart(&[("A", 1), ("B", 2)])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["code"], "insufficient_stock");

    let item = store.get_item(&"A".into()).await.unwrap().unwrap();
    assert_eq!(item.quantity_on_hand, 5);
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/orders",
            Some((BuyerId::new(), "buyer")),
            Some(cart(&[("Z", 1)])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_history_lists_own_orders() {
    let (app, _) = setup().await;
    let alice = BuyerId::new();
    let bob = BuyerId::new();

    for (buyer, qty) in [(alice, 1), (bob, 1), (alice, 2)] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/orders",
                Some((buyer, "buyer")),
                Some(cart(&[("A", qty)])),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request("GET", "/orders", Some((alice, "buyer")), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["total_cents"], 2000);
    assert_eq!(orders[1]["total_cents"], 1000);
    assert_eq!(orders[0]["lines"][0]["item_name"], "Widget");
}

#[tokio::test]
async fn test_all_orders_is_staff_only() {
    let (app, _) = setup().await;
    let buyer = BuyerId::new();

    app.clone()
        .oneshot(request(
            "POST",
            "/orders",
            Some((buyer, "buyer")),
            Some(cart(&[("A", 1)])),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request("GET", "/orders/all", Some((buyer, "buyer")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(request(
            "GET",
            "/orders/all",
            Some((BuyerId::new(), "staff")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_and_get_items() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(request("GET", "/items", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["id"], "A");

    let response = app
        .clone()
        .oneshot(request("GET", "/items/B", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["unit_price_cents"], 250);

    let response = app
        .oneshot(request("GET", "/items/missing", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_writes_are_staff_only() {
    let (app, store) = setup().await;
    let body = serde_json::json!({
        "name": "Sprocket",
        "category": "parts",
        "unit_price_cents": 75,
        "quantity_on_hand": 40,
    });

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/items/C",
            Some((BuyerId::new(), "buyer")),
            Some(body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(store.get_item(&"C".into()).await.unwrap().is_none());

    let response = app
        .oneshot(request(
            "PUT",
            "/items/C",
            Some((BuyerId::new(), "staff")),
            Some(body),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let item = store.get_item(&"C".into()).await.unwrap().unwrap();
    assert_eq!(item.name, "Sprocket");
    assert_eq!(item.quantity_on_hand, 40);
}

#[tokio::test]
async fn test_price_change_does_not_touch_placed_orders() {
    let (app, _) = setup().await;
    let buyer = BuyerId::new();
    let staff = BuyerId::new();

    app.clone()
        .oneshot(request(
            "POST",
            "/orders",
            Some((buyer, "buyer")),
            Some(cart(&[("A", 1)])),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/items/A/price",
            Some((staff, "staff")),
            Some(serde_json::json!({ "unit_price_cents": 1500 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["unit_price_cents"], 1500);

    let response = app
        .oneshot(request("GET", "/orders", Some((buyer, "buyer")), None))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json[0]["total_cents"], 1000);
    assert_eq!(json[0]["lines"][0]["unit_price_cents"], 1000);
}

#[tokio::test]
async fn test_negative_price_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "PUT",
            "/items/A/price",
            Some((BuyerId::new(), "staff")),
            Some(serde_json::json!({ "unit_price_cents": -5 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_restock_adds_units() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/items/B/restock",
            Some((BuyerId::new(), "staff")),
            Some(serde_json::json!({ "quantity": 9 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["quantity_on_hand"], 10);
}

#[tokio::test]
async fn test_restock_overflow_is_rejected_and_catalog_stays_readable() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/items/A/restock",
            Some((BuyerId::new(), "staff")),
            Some(serde_json::json!({ "quantity": u32::MAX })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(request("GET", "/items/A", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["quantity_on_hand"], 5);
}

#[tokio::test]
async fn test_restock_unknown_item_is_not_found() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(request(
            "POST",
            "/items/Z/restock",
            Some((BuyerId::new(), "staff")),
            Some(serde_json::json!({ "quantity": 1 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup().await;

    app.clone()
        .oneshot(request(
            "POST",
            "/orders",
            Some((BuyerId::new(), "buyer")),
            Some(cart(&[("A", 1)])),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request("GET", "/metrics", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
