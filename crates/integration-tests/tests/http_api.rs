//! HTTP routes over the in-memory shop.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use shopvox_integration_tests::{TestShop, unit_vector};
use shopvox_server::store::EmbeddingTarget;

async fn send(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn kettle_shop() -> TestShop {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let kettle = shop.store.add_product(domain, "Kettle", None);
    let variant = shop.store.add_variant(kettle, "Steel", 300_000, None);
    shop.store
        .set_embedding(EmbeddingTarget::Variant(variant), unit_vector(0.9));
    shop
}

#[tokio::test]
async fn test_health() {
    let shop = TestShop::new();
    let (status, body) = send(shop.router(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn test_readiness_without_database() {
    let shop = TestShop::new();
    let (status, _) = send(shop.router(), Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_function_definitions() {
    let shop = TestShop::new();
    let (status, body) = send_json(shop.router(), Method::GET, "/api/functions", None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "search_products",
            "add_to_cart",
            "get_cart_info",
            "browse_catalog",
            "get_product_info"
        ]
    );
}

#[tokio::test]
async fn test_call_function() {
    let shop = kettle_shop();
    let body = json!({
        "operation": "search_products",
        "arguments": {"hostname": "shop.test", "query": "kettle"}
    })
    .to_string();

    let (status, body) =
        send_json(shop.router(), Method::POST, "/api/functions", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Kettle Steel costs 3 000 ₽.");
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_function_is_not_found() {
    let shop = TestShop::new();
    let body = json!({"operation": "checkout", "arguments": {}}).to_string();

    let (status, body) =
        send_json(shop.router(), Method::POST, "/api/functions", Some(&body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "FUNCTION_NOT_FOUND");

    let (status, _) = send(
        shop.router(),
        Method::POST,
        "/api/functions/checkout",
        Some("{}"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_call_named_function() {
    let shop = kettle_shop();
    let body = json!({"hostname": "shop.test", "query": "kettle"}).to_string();

    let (status, body) = send_json(
        shop.router(),
        Method::POST,
        "/api/functions/search_products",
        Some(&body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Kettle Steel costs 3 000 ₽.");
}

#[tokio::test]
async fn test_named_function_with_empty_body() {
    let shop = TestShop::new();
    let (status, body) = send_json(
        shop.router(),
        Method::POST,
        "/api/functions/get_cart_info",
        None,
    )
    .await;
    // no hostname means localhost, which is not seeded
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "DOMAIN_NOT_FOUND");
    assert_eq!(body["hostname"], "localhost");
}

#[tokio::test]
async fn test_failed_envelope_is_still_ok() {
    let shop = kettle_shop();
    let body = json!({"hostname": "shop.test", "variantId": 0}).to_string();

    let (status, body) = send_json(
        shop.router(),
        Method::POST,
        "/api/functions/add_to_cart",
        Some(&body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "INVALID_VARIANT_ID");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let shop = TestShop::new();

    let (status, _) = send(
        shop.router(),
        Method::POST,
        "/api/functions",
        Some("{\"operation\":"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        shop.router(),
        Method::POST,
        "/api/functions/search_products",
        Some("not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
