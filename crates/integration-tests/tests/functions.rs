//! Dispatcher envelopes, error codes and the cart functions.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use shopvox_integration_tests::TestShop;
use shopvox_server::functions::{DispatchError, ErrorCode, FunctionCall, Operation};
use shopvox_server::store::CartStore;

#[tokio::test]
async fn test_unknown_function() {
    let shop = TestShop::new();
    let call = FunctionCall {
        operation: "checkout".into(),
        arguments: json!({"hostname": "shop.test"}),
    };

    let err = shop.dispatcher.dispatch(&call).await.unwrap_err();
    assert!(matches!(&err, DispatchError::FunctionNotFound(name) if name == "checkout"));

    let envelope = serde_json::to_value(err.to_envelope()).unwrap();
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"], "FUNCTION_NOT_FOUND");
}

#[tokio::test]
async fn test_every_operation_reports_unknown_domain() {
    let shop = TestShop::new();
    let args = json!({
        "hostname": "nowhere.test",
        "query": "mug",
        "variantId": 1,
        "productId": 1,
    });

    for operation in Operation::ALL {
        let response = shop.dispatcher.execute(operation.name(), &args).await.unwrap();
        assert!(!response.success, "{operation}");
        assert_eq!(response.error, Some(ErrorCode::DomainNotFound), "{operation}");
        assert!(!response.response.is_empty());
    }
}

#[tokio::test]
async fn test_missing_hostname_defaults_to_localhost() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("localhost");
    let product = shop.store.add_product(domain, "Mug", None);
    shop.store.add_variant(product, "Default Title", 50_000, None);

    let response = shop
        .dispatcher
        .execute("browse_catalog", &json!({}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.get("catalog").unwrap()["totalProducts"], 1);
}

#[tokio::test]
async fn test_zero_quantity_leaves_cart_untouched() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let product = shop.store.add_product(domain, "Mug", None);
    let variant = shop.store.add_variant(product, "Red", 50_000, None);
    let user = shop.store.add_user();

    let response = shop
        .dispatcher
        .execute(
            "add_to_cart",
            &json!({"hostname": "shop.test", "variantId": variant.as_i32(), "quantity": 0}),
        )
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error, Some(ErrorCode::InvalidQuantity));
    assert!(shop.store.find_cart(user, domain).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cart_flow_across_functions() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let kettle = shop.store.add_product(domain, "Kettle", None);
    let steel = shop.store.add_variant(kettle, "Default Title", 300_000, Some("KT-1"));
    let mug = shop.store.add_product(domain, "Mug", None);
    let red = shop.store.add_variant(mug, "Red", 50_000, None);
    shop.store.add_user();

    let added = shop
        .dispatcher
        .execute(
            "add_to_cart",
            &json!({"hostname": "shop.test", "variantId": steel.as_i32()}),
        )
        .await
        .unwrap();
    assert_eq!(added.response, "Added \"Kettle\" to your cart: 1 pcs for 3 000 ₽.");

    shop.dispatcher
        .execute(
            "add_to_cart",
            &json!({"hostname": "shop.test", "variantId": red.as_i32(), "quantity": "3"}),
        )
        .await
        .unwrap();

    let info = shop
        .dispatcher
        .execute("get_cart_info", &json!({"hostname": "shop.test"}))
        .await
        .unwrap();
    assert_eq!(
        info.response,
        "Your cart has 4 item(s) totaling 4 500 ₽:\n\
         1. Kettle (KT-1)\n   1 pcs x 3 000 ₽ = 3 000 ₽\n\
         2. Mug Red\n   3 pcs x 500 ₽ = 1 500 ₽\n\
         Total: 4 500 ₽"
    );
    let cart = info.get("cart").unwrap();
    assert_eq!(cart["totalAmount"], 450_000);
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert!(cart["id"].is_string());
}

#[tokio::test]
async fn test_carts_are_per_domain() {
    let shop = TestShop::new();
    let first = shop.store.add_domain("first.test");
    shop.store.add_domain("second.test");
    let product = shop.store.add_product(first, "Mug", None);
    let variant = shop.store.add_variant(product, "Red", 50_000, None);
    shop.store.add_user();

    shop.dispatcher
        .execute(
            "add_to_cart",
            &json!({"hostname": "first.test", "variantId": variant.as_i32()}),
        )
        .await
        .unwrap();

    let other = shop
        .dispatcher
        .execute("get_cart_info", &json!({"hostname": "second.test"}))
        .await
        .unwrap();
    assert_eq!(other.response, "Your cart is empty.");
}

#[tokio::test]
async fn test_explicit_user_has_own_cart() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let product = shop.store.add_product(domain, "Mug", None);
    let variant = shop.store.add_variant(product, "Red", 50_000, None);
    let default_user = shop.store.add_user();
    let second_user = shop.store.add_user();

    shop.dispatcher
        .execute(
            "add_to_cart",
            &json!({"hostname": "shop.test", "variantId": variant.as_i32(), "userId": second_user.as_i32()}),
        )
        .await
        .unwrap();

    assert!(shop.store.find_cart(default_user, domain).await.unwrap().is_none());
    assert!(shop.store.find_cart(second_user, domain).await.unwrap().is_some());
}

#[tokio::test]
async fn test_product_info_after_search() {
    let shop = TestShop::new();
    let domain = shop.store.add_domain("shop.test");
    let kettle = shop.store.add_product(domain, "Kettle", Some("Steel kettle"));
    shop.store.add_variant(kettle, "Default Title", 300_000, Some("KT-1"));

    let response = shop
        .dispatcher
        .execute(
            "get_product_info",
            &json!({"hostname": "shop.test", "productId": kettle.as_i32()}),
        )
        .await
        .unwrap();
    assert_eq!(response.response, "Kettle costs 3 000 ₽.");
    assert_eq!(response.get("product").unwrap()["variant"]["sku"], "KT-1");
}

#[tokio::test]
async fn test_search_unavailable_when_embedder_fails() {
    let shop = TestShop::with_embedder(
        shopvox_integration_tests::ScriptedEmbedder::new(),
        &shopvox_server::config::SearchSettings::default(),
    );
    let domain = shop.store.add_domain("shop.test");
    shop.store.add_product(domain, "Kettle", None);

    let response = shop
        .dispatcher
        .execute(
            "search_products",
            &json!({"hostname": "shop.test", "query": "kettle"}),
        )
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error, Some(ErrorCode::SearchUnavailable));
    assert!(!response.response.is_empty());
}
