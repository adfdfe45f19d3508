//! `add_to_cart`: add a variant to the shopper's cart for this shop.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use shopvox_core::{CartItemId, Price, UserId, VariantId};

use super::get_cart_info::CartTotals;
use super::{ErrorCode, FunctionDispatcher, FunctionResponse, HandlerError, args, item_label};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartItemPayload {
    id: CartItemId,
    variant_id: VariantId,
    quantity: i32,
    product_title: String,
    variant_title: String,
    price: i64,
    total_price: i64,
}

impl FunctionDispatcher {
    pub(super) async fn add_to_cart(
        &self,
        hostname: &str,
        args: &Value,
    ) -> Result<FunctionResponse, HandlerError> {
        let variant_id = args::required_id(args, "variantId", VariantId::from_positive)
            .map_err(|_| {
                HandlerError::rejected(
                    ErrorCode::InvalidVariantId,
                    "A valid product variant id is required.",
                )
            })?;
        let quantity = args::quantity(args).map_err(|_| {
            HandlerError::rejected(ErrorCode::InvalidQuantity, "Quantity must be greater than 0.")
        })?;
        let requested_user = args::optional_id(args, "userId", UserId::from_positive);

        let domain = self.domain(hostname).await?;
        let Some(detail) = self.catalog.find_variant(domain.id, variant_id).await? else {
            return Err(HandlerError::rejected(
                ErrorCode::VariantNotFound,
                "That product could not be found.",
            ));
        };
        let user_id = self.user(requested_user).await?;

        let cart = self.carts.find_or_create_cart(user_id, domain.id).await?;
        let upsert = self
            .carts
            .upsert_cart_item(cart.id, variant_id, quantity)
            .await?;
        let lines = self.carts.cart_lines(cart.id).await?;
        let totals = CartTotals::from_lines(&lines);

        let currency = self.currency();
        let label = item_label(&detail.product_title, &detail.variant.title);
        let line_total = Price::from_minor_units(detail.variant.price, currency)
            .times(i64::from(upsert.item.quantity));

        let response = if upsert.created {
            format!("Added \"{label}\" to your cart: {quantity} pcs for {line_total}.")
        } else {
            format!(
                "Updated \"{label}\" in your cart. Now {} pcs for {line_total}.",
                upsert.item.quantity
            )
        };

        info!(
            cart_id = %cart.id,
            variant_id = %variant_id,
            quantity = upsert.item.quantity,
            created = upsert.created,
            "Added item to cart"
        );

        let item = CartItemPayload {
            id: upsert.item.id,
            variant_id,
            quantity: upsert.item.quantity,
            product_title: detail.product_title,
            variant_title: detail.variant.title,
            price: detail.variant.price,
            total_price: line_total.minor_units,
        };

        Ok(FunctionResponse::ok(response)
            .with("cartItem", &item)?
            .with("cartSummary", &totals)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use crate::functions::ErrorCode;
    use crate::store::CartStore;
    use crate::testing::dispatcher_with_store;

    #[tokio::test]
    async fn test_add_then_increase() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Mug", None);
        let variant = store.add_variant(product, "Red", 50_000, Some("MUG-R"));
        let other = store.add_variant(product, "Blue", 60_000, None);
        store.add_user();

        let args = json!({"hostname": "shop.test", "variantId": variant.as_i32(), "quantity": 2});
        let first = dispatcher.execute("add_to_cart", &args).await.unwrap();
        assert!(first.success);
        assert_eq!(first.response, "Added \"Mug Red\" to your cart: 2 pcs for 1 000 ₽.");
        assert_eq!(first.get("cartItem").unwrap()["quantity"], 2);
        assert_eq!(first.get("cartItem").unwrap()["totalPrice"], 100_000);

        let second = dispatcher
            .execute("add_to_cart", &json!({"hostname": "shop.test", "variantId": variant.to_string()}))
            .await
            .unwrap();
        assert_eq!(second.response, "Updated \"Mug Red\" in your cart. Now 3 pcs for 1 500 ₽.");

        dispatcher
            .execute("add_to_cart", &json!({"hostname": "shop.test", "variantId": other.as_i32()}))
            .await
            .unwrap();
        let summary = dispatcher
            .execute("add_to_cart", &json!({"hostname": "shop.test", "variantId": other.as_i32()}))
            .await
            .unwrap();
        assert_eq!(
            summary.get("cartSummary").unwrap(),
            &json!({"totalItems": 5, "totalAmount": 270_000})
        );
    }

    #[tokio::test]
    async fn test_validation_precedes_store_access() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Mug", None);
        let variant = store.add_variant(product, "Red", 50_000, None);
        let user = store.add_user();

        let response = dispatcher
            .execute(
                "add_to_cart",
                &json!({"hostname": "nowhere.test", "variantId": variant.as_i32(), "quantity": 0}),
            )
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::InvalidQuantity));

        let response = dispatcher
            .execute("add_to_cart", &json!({"hostname": "nowhere.test", "variantId": "x"}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::InvalidVariantId));

        assert!(store.find_cart(user, domain).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_variant_scoped_to_domain() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        store.add_domain("shop.test");
        let other = store.add_domain("other.test");
        let product = store.add_product(other, "Mug", None);
        let variant = store.add_variant(product, "Red", 50_000, None);
        store.add_user();

        let response = dispatcher
            .execute("add_to_cart", &json!({"hostname": "shop.test", "variantId": variant.as_i32()}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::VariantNotFound));
    }

    #[tokio::test]
    async fn test_no_user() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Mug", None);
        let variant = store.add_variant(product, "Red", 50_000, None);

        let response = dispatcher
            .execute("add_to_cart", &json!({"hostname": "shop.test", "variantId": variant.as_i32()}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::UserNotFound));
    }
}
