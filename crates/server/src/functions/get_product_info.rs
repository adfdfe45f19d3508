//! `get_product_info`: price of a product, or of one of its variants.

use serde::Serialize;
use serde_json::Value;

use shopvox_core::{Price, ProductId, VariantId};

use super::{ErrorCode, FunctionDispatcher, FunctionResponse, HandlerError, args, item_label};

#[derive(Debug, Serialize)]
struct ProductPayload {
    id: ProductId,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    variant: VariantPayload,
}

#[derive(Debug, Serialize)]
struct VariantPayload {
    id: VariantId,
    title: String,
    price: i64,
    sku: String,
}

impl FunctionDispatcher {
    pub(super) async fn get_product_info(
        &self,
        hostname: &str,
        args: &Value,
    ) -> Result<FunctionResponse, HandlerError> {
        let product_id = args::required_id(args, "productId", ProductId::from_positive)
            .map_err(|_| {
                HandlerError::rejected(ErrorCode::InvalidProductId, "A valid product id is required.")
            })?;
        let variant_id = args::optional_id(args, "variantId", VariantId::from_positive)
            .map_err(|_| {
                HandlerError::rejected(
                    ErrorCode::InvalidVariantId,
                    "The variant id must be a positive integer.",
                )
            })?;

        let domain = self.domain(hostname).await?;
        let Some(found) = self.catalog.find_product(Some(domain.id), product_id).await? else {
            return Err(HandlerError::rejected(
                ErrorCode::ProductNotFound,
                "That product could not be found.",
            ));
        };

        // Variants come back ordered by id, so the default pick is stable.
        let variant = match variant_id {
            Some(id) => found.variants.into_iter().find(|v| v.id == id).ok_or_else(|| {
                HandlerError::rejected(
                    ErrorCode::VariantNotFound,
                    "That variant of the product could not be found.",
                )
            })?,
            None => found.variants.into_iter().next().ok_or_else(|| {
                HandlerError::rejected(
                    ErrorCode::NoVariantsAvailable,
                    "This product has no variants available for purchase.",
                )
            })?,
        };

        let price = Price::from_minor_units(variant.price, self.currency());
        let response = format!(
            "{} costs {price}.",
            item_label(&found.product.title, &variant.title)
        );

        let payload = ProductPayload {
            id: found.product.id,
            title: found.product.title,
            description: found.product.description,
            variant: VariantPayload {
                id: variant.id,
                title: variant.title,
                price: variant.price,
                sku: variant.sku.unwrap_or_default(),
            },
        };
        Ok(FunctionResponse::ok(response).with("product", &payload)?)
    }
}
