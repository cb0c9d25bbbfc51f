//! Integration tests for the cart HTTP API.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cart_service::{AppState, CartStore, InMemoryCartStore};
use common::{CartId, CartStatus, CartSubmission, ORDERS_QUEUE};
use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
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

struct TestApp {
    app: axum::Router,
    store: InMemoryCartStore,
    broker: InMemoryBroker,
}

fn setup() -> TestApp {
    let store = InMemoryCartStore::new();
    let broker = InMemoryBroker::new();
    let state = Arc::new(AppState::new(store.clone(), Arc::new(broker.clone())));
    let app = cart_service::create_app(state, get_metrics_handle());
    TestApp { app, store, broker }
}

fn sample_cart() -> Value {
    json!({
        "Details": [{"ProductId": 7, "Price": 10, "Quantity": 2}],
        "Total": 20,
        "CustomerId": "c1"
    })
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let test = setup();

    let (status, _, body) = send(&test.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let json = json_body(&body);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "cart-service");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let test = setup();

    let (status, headers, _) = send(&test.app, "GET", "/metrics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
}

#[tokio::test]
async fn test_create_cart_publishes_one_submission() {
    let test = setup();

    let (status, headers, body) = send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::LOCATION], "/api/carts/1");

    let cart = json_body(&body);
    assert_eq!(cart["CartId"], 1);
    assert_eq!(cart["Status"], "INITIATED");
    assert_eq!(cart["Total"], 20.0);
    assert_eq!(cart["CustomerId"], "c1");
    assert_eq!(cart["OrderId"], Value::Null);

    let submissions: Vec<CartSubmission> = test.broker.published_json(ORDERS_QUEUE).await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].cart_id, CartId::new(1));
    assert_eq!(submissions[0].total, 20.0);
    assert_eq!(submissions[0].customer_id.as_str(), "c1");
    assert_eq!(submissions[0].details.len(), 1);
}

#[tokio::test]
async fn test_create_ignores_client_status() {
    let test = setup();
    let mut body = sample_cart();
    body["Status"] = json!("SUCCESS");
    body["OrderId"] = json!(99);

    let (status, _, body) = send(&test.app, "POST", "/api/carts", Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    let cart = json_body(&body);
    assert_eq!(cart["Status"], "INITIATED");
    assert_eq!(cart["OrderId"], Value::Null);
}

#[tokio::test]
async fn test_create_publish_failure_returns_500() {
    let test = setup();
    test.broker.fail_publishes_to(ORDERS_QUEUE, true).await;

    let (status, _, body) = send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("Cart 1"));

    let stored = test.store.get(CartId::new(1)).await.unwrap().unwrap();
    assert_eq!(stored.status, CartStatus::Initiated);
}

#[tokio::test]
async fn test_get_cart_is_stable() {
    let test = setup();
    send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    let (first_status, _, first) = send(&test.app, "GET", "/api/carts/1", None).await;
    let (second_status, _, second) = send(&test.app, "GET", "/api/carts/1", None).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_get_missing_cart() {
    let test = setup();

    let (status, _, body) = send(&test.app, "GET", "/api/carts/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&body)["error"].as_str().is_some());
}

#[tokio::test]
async fn test_list_carts() {
    let test = setup();
    send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;
    send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    let (status, _, body) = send(&test.app, "GET", "/api/carts", None).await;

    assert_eq!(status, StatusCode::OK);
    let carts = json_body(&body);
    let ids: Vec<i64> = carts
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["CartId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_update_cart() {
    let test = setup();
    send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    let update = json!({
        "CartId": 1,
        "Details": [],
        "Total": 0,
        "CustomerId": "c2",
        "Status": "FAILED",
        "OrderId": 0
    });
    let (status, _, _) = send(&test.app, "PUT", "/api/carts/1", Some(update)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = send(&test.app, "GET", "/api/carts/1", None).await;
    let cart = json_body(&body);
    assert_eq!(cart["CustomerId"], "c2");
    assert_eq!(cart["Status"], "FAILED");
    assert_eq!(cart["OrderId"], Value::Null);
}

#[tokio::test]
async fn test_update_id_mismatch_is_checked_first() {
    let test = setup();

    // Cart 5 does not exist, but the mismatch wins.
    let (status, _, _) = send(
        &test.app,
        "PUT",
        "/api/carts/5",
        Some(json!({"CartId": 6, "Total": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&test.app, "PUT", "/api/carts/5", Some(json!({"Total": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_missing_cart() {
    let test = setup();

    let (status, _, _) = send(
        &test.app,
        "PUT",
        "/api/carts/5",
        Some(json!({"CartId": 5, "Total": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(test.store.cart_count().await, 0);
}

#[tokio::test]
async fn test_delete_cart() {
    let test = setup();
    send(&test.app, "POST", "/api/carts", Some(sample_cart())).await;

    let (status, _, _) = send(&test.app, "DELETE", "/api/carts/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(&test.app, "GET", "/api/carts/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&test.app, "DELETE", "/api/carts/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_failure_returns_500() {
    let test = setup();
    test.store.set_fail_on_read(true).await;

    let (status, _, body) = send(&test.app, "GET", "/api/carts", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"].as_str().is_some());
}
