//! `get_cart_info`: cart contents and totals for the shopper.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use shopvox_core::{CartId, CartItemId, Price, UserId, VariantId};

use super::{FunctionDispatcher, FunctionResponse, HandlerError, args, item_label};
use crate::store::CartLine;

/// Item count and amount of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartTotals {
    pub total_items: i64,
    /// Minor currency units.
    pub total_amount: i64,
}

impl CartTotals {
    pub(super) fn from_lines(lines: &[CartLine]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| {
            let quantity = i64::from(line.item.quantity);
            Self {
                total_items: acc.total_items.saturating_add(quantity),
                total_amount: acc
                    .total_amount
                    .saturating_add(line.price.saturating_mul(quantity)),
            }
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartPayload {
    id: Option<CartId>,
    #[serde(flatten)]
    totals: CartTotals,
    items: Vec<CartLinePayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartLinePayload {
    id: CartItemId,
    variant_id: VariantId,
    quantity: i32,
    product_title: String,
    variant_title: String,
    price: i64,
    total_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
}

impl FunctionDispatcher {
    pub(super) async fn get_cart_info(
        &self,
        hostname: &str,
        args: &Value,
    ) -> Result<FunctionResponse, HandlerError> {
        let requested_user = args::optional_id(args, "userId", UserId::from_positive);
        let domain = self.domain(hostname).await?;
        let user_id = self.user(requested_user).await?;

        let cart = self.carts.find_cart(user_id, domain.id).await?;
        let lines = match &cart {
            Some(cart) => self.carts.cart_lines(cart.id).await?,
            None => Vec::new(),
        };
        let totals = CartTotals::from_lines(&lines);
        let currency = self.currency();

        let response = if lines.is_empty() {
            "Your cart is empty.".to_string()
        } else {
            let mut out = format!(
                "Your cart has {} item(s) totaling {}:",
                totals.total_items,
                Price::from_minor_units(totals.total_amount, currency)
            );
            for (i, line) in lines.iter().enumerate() {
                let unit = Price::from_minor_units(line.price, currency);
                let _ = write!(
                    out,
                    "\n{}. {}",
                    i + 1,
                    item_label(&line.product_title, &line.variant_title)
                );
                if let Some(sku) = &line.sku {
                    let _ = write!(out, " ({sku})");
                }
                let _ = write!(
                    out,
                    "\n   {} pcs x {unit} = {}",
                    line.item.quantity,
                    unit.times(i64::from(line.item.quantity))
                );
            }
            let _ = write!(
                out,
                "\nTotal: {}",
                Price::from_minor_units(totals.total_amount, currency)
            );
            out
        };

        let payload = CartPayload {
            id: cart.map(|c| c.id),
            totals,
            items: lines
                .into_iter()
                .map(|line| CartLinePayload {
                    id: line.item.id,
                    variant_id: line.item.variant_id,
                    quantity: line.item.quantity,
                    total_price: line.price.saturating_mul(i64::from(line.item.quantity)),
                    product_title: line.product_title,
                    variant_title: line.variant_title,
                    price: line.price,
                    sku: line.sku,
                })
                .collect(),
        };

        Ok(FunctionResponse::ok(response).with("cart", &payload)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use crate::functions::ErrorCode;
    use crate::testing::dispatcher_with_store;

    #[tokio::test]
    async fn test_empty_cart() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        store.add_domain("shop.test");
        store.add_user();

        let response = dispatcher
            .execute("get_cart_info", &json!({"hostname": "shop.test"}))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.response, "Your cart is empty.");
        assert_eq!(
            response.get("cart").unwrap(),
            &json!({"id": null, "totalItems": 0, "totalAmount": 0, "items": []})
        );
    }

    #[tokio::test]
    async fn test_cart_listing() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Mug", None);
        let variant = store.add_variant(product, "Red", 50_000, Some("MUG-R"));
        store.add_user();

        dispatcher
            .execute(
                "add_to_cart",
                &json!({"hostname": "shop.test", "variantId": variant.as_i32(), "quantity": 2}),
            )
            .await
            .unwrap();
        let response = dispatcher
            .execute("get_cart_info", &json!({"hostname": "shop.test"}))
            .await
            .unwrap();

        assert_eq!(
            response.response,
            "Your cart has 2 item(s) totaling 1 000 ₽:\n1. Mug Red (MUG-R)\n   2 pcs x 500 ₽ = 1 000 ₽\nTotal: 1 000 ₽"
        );
        let cart = response.get("cart").unwrap();
        assert_eq!(cart["totalItems"], 2);
        assert_eq!(cart["items"][0]["sku"], "MUG-R");
        assert_eq!(cart["items"][0]["totalPrice"], 100_000);
    }

    #[tokio::test]
    async fn test_unknown_explicit_user() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        store.add_domain("shop.test");
        store.add_user();

        let response = dispatcher
            .execute("get_cart_info", &json!({"hostname": "shop.test", "userId": 999}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::UserNotFound));
    }
}
