//! `browse_catalog`: overview of the newest active products.

use std::fmt::Write as _;

use serde::Serialize;

use shopvox_core::{CurrencyCode, Price, ProductId, VariantId};

use super::{FunctionDispatcher, FunctionResponse, HandlerError};
use crate::search::empty_catalog_message;
use crate::store::CatalogEntry;

/// Products shown in an overview.
const FEATURED_PRODUCTS: usize = 8;

/// Cheapest variants shown per product.
const SAMPLE_VARIANTS: usize = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogPayload {
    total_products: u64,
    featured_products: Vec<FeaturedProduct>,
    categories: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeaturedProduct {
    id: ProductId,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    variants_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_range: Option<PriceRange>,
    sample_variants: Vec<SampleVariant>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PriceRange {
    min: i64,
    max: i64,
}

#[derive(Debug, Serialize)]
struct SampleVariant {
    id: VariantId,
    title: String,
    price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
}

impl From<CatalogEntry> for FeaturedProduct {
    fn from(entry: CatalogEntry) -> Self {
        let price_range = entry
            .min_price
            .zip(entry.max_price)
            .map(|(min, max)| PriceRange { min, max });
        Self {
            id: entry.product.id,
            title: entry.product.title,
            description: entry.product.description.filter(|d| !d.trim().is_empty()),
            variants_count: entry.variant_count,
            price_range,
            sample_variants: entry
                .sample_variants
                .into_iter()
                .map(|v| SampleVariant {
                    id: v.id,
                    title: v.title,
                    price: v.price,
                    sku: v.sku,
                })
                .collect(),
        }
    }
}

impl FunctionDispatcher {
    pub(super) async fn browse_catalog(
        &self,
        hostname: &str,
    ) -> Result<FunctionResponse, HandlerError> {
        let domain = self.domain(hostname).await?;
        let total_products = self.catalog.count_active_products(domain.id).await?;

        if total_products == 0 {
            let payload = CatalogPayload {
                total_products,
                featured_products: Vec::new(),
                categories: Vec::new(),
            };
            return Ok(FunctionResponse::ok(empty_catalog_message()).with("catalog", &payload)?);
        }

        let entries = self
            .catalog
            .list_active_products(domain.id, FEATURED_PRODUCTS, SAMPLE_VARIANTS)
            .await?;
        let featured: Vec<FeaturedProduct> = entries.into_iter().map(Into::into).collect();
        let categories = categories(&featured);
        let response = overview(total_products, &featured, &categories, self.currency());

        let payload = CatalogPayload {
            total_products,
            featured_products: featured,
            categories,
        };
        Ok(FunctionResponse::ok(response).with("catalog", &payload)?)
    }
}

/// Distinct first words of the product titles, in listing order.
fn categories(products: &[FeaturedProduct]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for product in products {
        let Some(word) = product.title.split_whitespace().next() else {
            continue;
        };
        if !seen.iter().any(|s| s.to_lowercase() == word.to_lowercase()) {
            seen.push(word.to_string());
        }
    }
    seen
}

fn overview(
    total: u64,
    featured: &[FeaturedProduct],
    categories: &[String],
    currency: CurrencyCode,
) -> String {
    let mut out = format!("Our catalog has {total} product(s).");
    if !categories.is_empty() {
        let _ = write!(out, "\nCategories: {}", categories.join(", "));
    }
    out.push_str("\n\nFeatured products:");

    for (i, product) in featured.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, product.title);
        if let Some(description) = &product.description {
            let _ = write!(out, "\n   {}", description.trim());
        }
        match product.price_range {
            Some(PriceRange { min, max }) if min == max => {
                let _ = write!(out, "\n   {}", Price::from_minor_units(min, currency));
            }
            Some(PriceRange { min, max }) => {
                let _ = write!(
                    out,
                    "\n   from {} to {}",
                    Price::from_minor_units(min, currency),
                    Price::from_minor_units(max, currency)
                );
            }
            None => out.push_str("\n   not available right now"),
        }
        if product.variants_count > 1 {
            let _ = write!(out, " ({} variants)", product.variants_count);
        }
    }

    let shown = featured.len() as u64;
    if total > shown {
        let _ = write!(
            out,
            "\n\n...and {} more. Ask about a specific product or category.",
            total - shown
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use shopvox_core::ProductStatus;

    use crate::search::empty_catalog_message;
    use crate::testing::dispatcher_with_store;

    #[tokio::test]
    async fn test_empty_catalog() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Hidden mug", None);
        store.set_product_status(product, ProductStatus::Inactive);

        let response = dispatcher
            .execute("browse_catalog", &json!({"hostname": "shop.test"}))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.response, empty_catalog_message());
        assert_eq!(
            response.get("catalog").unwrap(),
            &json!({"totalProducts": 0, "featuredProducts": [], "categories": []})
        );
    }

    #[tokio::test]
    async fn test_overview_newest_first_with_price_range() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let mug = store.add_product(domain, "Mug classic", Some("Ceramic mug"));
        store.add_variant(mug, "Red", 50_000, None);
        store.add_variant(mug, "Blue", 70_000, None);
        let kettle = store.add_product(domain, "Kettle", None);
        store.add_variant(kettle, "Default Title", 300_000, None);

        let response = dispatcher
            .execute("browse_catalog", &json!({"hostname": "shop.test"}))
            .await
            .unwrap();

        assert_eq!(
            response.response,
            "Our catalog has 2 product(s).\nCategories: Kettle, Mug\n\nFeatured products:\n1. Kettle\n   3 000 ₽\n2. Mug classic\n   Ceramic mug\n   from 500 ₽ to 700 ₽ (2 variants)"
        );
        let catalog = response.get("catalog").unwrap();
        assert_eq!(catalog["featuredProducts"][1]["priceRange"], json!({"min": 50_000, "max": 70_000}));
        assert_eq!(catalog["featuredProducts"][1]["sampleVariants"][0]["title"], "Red");
    }

    #[tokio::test]
    async fn test_truncated_overview_mentions_rest() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        for i in 0..10 {
            let product = store.add_product(domain, &format!("Item {i}"), None);
            store.add_variant(product, "Default Title", 10_000, None);
        }

        let response = dispatcher
            .execute("browse_catalog", &json!({"hostname": "shop.test"}))
            .await
            .unwrap();
        let catalog = response.get("catalog").unwrap();
        assert_eq!(catalog["totalProducts"], 10);
        assert_eq!(catalog["featuredProducts"].as_array().unwrap().len(), 8);
        assert_eq!(catalog["categories"], json!(["Item"]));
        assert!(response.response.ends_with("...and 2 more. Ask about a specific product or category."));
    }
}
