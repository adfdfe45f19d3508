//! Search behaviour end to end: dispatcher, retriever, ranker and composer
//! over the in-memory store.

#![allow(clippy::unwrap_used)]

use serde_json::{Value, json};

use shopvox_core::{DomainId, ProductId, ProductStatus};
use shopvox_integration_tests::{TestShop, unit_vector};
use shopvox_server::functions::{ErrorCode, FunctionResponse};
use shopvox_server::search::{empty_catalog_message, not_found_message};
use shopvox_server::store::EmbeddingTarget;

async fn search(shop: &TestShop, query: &str) -> FunctionResponse {
    shop.dispatcher
        .execute(
            "search_products",
            &json!({"hostname": "shop.test", "query": query}),
        )
        .await
        .unwrap()
}

fn products(response: &FunctionResponse) -> Vec<Value> {
    response
        .get("products")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn add_embedded_variant(
    shop: &TestShop,
    product: ProductId,
    title: &str,
    price: i64,
    sku: Option<&str>,
    similarity: f32,
) {
    let variant = shop.store.add_variant(product, title, price, sku);
    shop.store
        .set_embedding(EmbeddingTarget::Variant(variant), unit_vector(similarity));
}

fn iphone_shop() -> (TestShop, DomainId, ProductId) {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let iphone = shop.store.add_product(domain, "iPhone 15", Some("Apple smartphone"));
    add_embedded_variant(&shop, iphone, "128GB", 7_999_000, Some("IP15-128"), 0.92);
    add_embedded_variant(&shop, iphone, "256GB", 8_999_000, Some("IP15-256"), 0.90);
    add_embedded_variant(&shop, iphone, "512GB", 10_999_000, Some("IP15-512"), 0.88);
    add_embedded_variant(&shop, iphone, "1TB", 12_999_000, None, 0.86);
    (shop, domain, iphone)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_product_many_variants_is_disambiguated() {
    let (shop, domain, iphone) = iphone_shop();
    let case = shop.store.add_product(domain, "Leather case", None);
    add_embedded_variant(&shop, case, "Brown", 499_000, None, 0.55);

    let response = search(&shop, "iPhone").await;

    assert!(response.success);
    assert_eq!(
        response.response,
        "Found \"iPhone 15\" in several variants:\n\
         1. iPhone 15 128GB - 79 990 ₽ (IP15-128)\n\
         2. iPhone 15 256GB - 89 990 ₽ (IP15-256)\n\
         3. iPhone 15 512GB - 109 990 ₽ (IP15-512)\n\
         4. iPhone 15 1TB - 129 990 ₽"
    );
    let products = products(&response);
    assert_eq!(products.len(), 4);
    assert!(
        products
            .iter()
            .all(|p| p["parentProductId"] == iphone.as_i32() && p["type"] == "variant")
    );
}

#[tokio::test]
async fn test_unknown_hostname() {
    let (shop, _, _) = iphone_shop();
    let response = shop
        .dispatcher
        .execute(
            "search_products",
            &json!({"hostname": "unknown.test", "query": "iPhone"}),
        )
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error, Some(ErrorCode::DomainNotFound));
    assert_eq!(
        serde_json::to_value(&response).unwrap()["error"],
        "DOMAIN_NOT_FOUND"
    );
}

#[tokio::test]
async fn test_empty_catalog() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let hidden = shop.store.add_product(domain, "Hidden", None);
    shop.store.set_product_status(hidden, ProductStatus::Inactive);

    let response = search(&shop, "anything").await;

    assert!(response.success);
    assert_eq!(response.response, empty_catalog_message());
    assert_eq!(response.get("products"), Some(&json!([])));
    assert!(shop.embedder.calls().is_empty());
}

#[tokio::test]
async fn test_unrelated_products_fall_back_to_full_pool() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let candle = shop.store.add_product(domain, "Scented candle", None);
    add_embedded_variant(&shop, candle, "Vanilla", 120_000, Some("CND-V"), 0.45);
    add_embedded_variant(&shop, candle, "Pine", 120_000, None, 0.1);
    let socks = shop.store.add_product(domain, "Wool socks", None);
    add_embedded_variant(&shop, socks, "Grey", 80_000, None, 0.45);

    let response = search(&shop, "gift ideas").await;

    assert!(response.success);
    assert_eq!(
        response.response,
        "Found several products matching \"gift ideas\":\n\
         1. Scented candle - 1 200 ₽ (CND-V)\n\
         2. Wool socks - 800 ₽"
    );
    let products = products(&response);
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["parentProductId"], candle.as_i32());
    assert_eq!(products[1]["parentProductId"], socks.as_i32());
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_disambiguation_excludes_other_products() {
    let (shop, domain, iphone) = iphone_shop();
    // A better-scoring product without the query text in its title.
    let charger = shop.store.add_product(domain, "USB-C charger", None);
    add_embedded_variant(&shop, charger, "20W", 199_000, None, 0.95);

    let response = search(&shop, "iphone 15").await;

    let products = products(&response);
    assert!(!products.is_empty());
    assert!(
        products
            .iter()
            .all(|p| p["parentProductId"] == iphone.as_i32())
    );
}

#[tokio::test]
async fn test_exact_title_match_beats_higher_similarity() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let kettle = shop.store.add_product(domain, "Electric kettle", None);
    add_embedded_variant(&shop, kettle, "Steel", 300_000, None, 0.45);
    let toaster = shop.store.add_product(domain, "Toaster", None);
    add_embedded_variant(&shop, toaster, "White", 450_000, None, 0.9);

    let response = search(&shop, "kettle").await;

    assert_eq!(response.response, "Electric kettle Steel costs 3 000 ₽.");
    let products = products(&response);
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["parentProductId"], kettle.as_i32());
}

#[tokio::test]
async fn test_nothing_above_last_resort_threshold() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let lamp = shop.store.add_product(domain, "Desk lamp", None);
    add_embedded_variant(&shop, lamp, "Black", 250_000, None, 0.2);

    let response = search(&shop, "surfboard").await;

    assert!(response.success);
    assert_eq!(response.response, not_found_message("surfboard"));
    assert!(products(&response).is_empty());
}

#[tokio::test]
async fn test_similarities_are_normalized() {
    let (shop, domain, _) = iphone_shop();
    let opposite = shop.store.add_product(domain, "iPhone stand", None);
    let variant = shop.store.add_variant(opposite, "Steel", 99_000, None);
    shop.store
        .set_embedding(EmbeddingTarget::Variant(variant), vec![-1.0, 0.0]);
    shop.store
        .set_embedding(EmbeddingTarget::Product(opposite), vec![1.0, 0.0]);

    let response = search(&shop, "iPhone").await;

    for product in products(&response) {
        let similarity = product["similarity"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&similarity), "{similarity}");
    }
}

#[tokio::test]
async fn test_identical_requests_give_identical_answers() {
    let (shop, domain, _) = iphone_shop();
    let case = shop.store.add_product(domain, "iPhone case", None);
    add_embedded_variant(&shop, case, "Clear", 99_000, None, 0.9);

    let first = search(&shop, "iphone").await;
    for _ in 0..5 {
        assert_eq!(search(&shop, "iphone").await, first);
    }
}

#[tokio::test]
async fn test_limit_caps_results() {
    let (shop, _, _) = iphone_shop();
    let response = shop
        .dispatcher
        .execute(
            "search_products",
            &json!({"hostname": "shop.test", "query": "iPhone", "limit": 2}),
        )
        .await
        .unwrap();
    assert_eq!(products(&response).len(), 2);
}

#[tokio::test]
async fn test_search_is_scoped_to_domain() {
    let (shop, _, _) = iphone_shop();
    let other = shop.store.add_domain("other.test");
    let pixel = shop.store.add_product(other, "Pixel phone", None);
    add_embedded_variant(&shop, pixel, "128GB", 6_999_000, None, 0.99);

    let response = search(&shop, "phone").await;

    assert!(
        products(&response)
            .iter()
            .all(|p| p["productTitle"] == "iPhone 15")
    );
}
