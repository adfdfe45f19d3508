//! Seed a domain's catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - title: Kettle
//!     description: Stainless steel, 1.7 l
//!     variants:
//!       - title: Steel
//!         price: 300000   # minor units
//!         sku: KT-STEEL
//!   - title: Old teapot
//!     status: inactive
//!     variants:
//!       - title: Default Title
//!         price: 99000
//! ```
//!
//! Seeded rows have no embeddings. Run `svx embeddings backfill` afterwards,
//! or pass `--embed`.

use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use shopvox_core::ProductStatus;

/// Root of a catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

#[derive(Debug, Deserialize)]
pub struct VariantSeed {
    pub title: String,
    pub price: i64,
    #[serde(default)]
    pub sku: Option<String>,
}

/// Counts of inserted rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub products: usize,
    pub variants: usize,
    pub removed: u64,
}

/// Check a parsed catalog; returns one message per problem.
#[must_use]
pub fn validate(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    if catalog.products.is_empty() {
        errors.push("catalog has no products".to_string());
    }
    for (i, product) in catalog.products.iter().enumerate() {
        let label = format!("products[{i}]");
        let has_text = !product.title.trim().is_empty()
            || product
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty());
        if !has_text {
            errors.push(format!("{label}: title and description are both empty"));
        }
        for (j, variant) in product.variants.iter().enumerate() {
            if variant.price < 0 {
                errors.push(format!("{label}.variants[{j}]: price must not be negative"));
            }
        }
    }
    errors
}

/// Parse and validate a catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or fails
/// validation.
pub async fn load(path: &Path) -> Result<CatalogFile, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(catalog)
}

/// Insert a catalog for `hostname`, creating the domain if needed.
///
/// With `replace`, the domain's existing products (and their variants and
/// cart lines) are deleted first. Everything runs in one transaction.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails; nothing is committed then.
pub async fn seed(
    pool: &PgPool,
    hostname: &str,
    catalog: &CatalogFile,
    replace: bool,
) -> Result<SeedResult, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut result = SeedResult::default();

    let domain_id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO domain (hostname)
        VALUES ($1)
        ON CONFLICT (hostname) DO UPDATE SET hostname = EXCLUDED.hostname
        RETURNING id
        ",
    )
    .bind(hostname)
    .fetch_one(&mut *tx)
    .await?;

    if replace {
        result.removed = sqlx::query("DELETE FROM product WHERE domain_id = $1")
            .bind(domain_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    for product in &catalog.products {
        let product_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO product (domain_id, title, description, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(domain_id)
        .bind(product.title.trim())
        .bind(product.description.as_deref().map(str::trim))
        .bind(product.status)
        .fetch_one(&mut *tx)
        .await?;
        result.products += 1;

        for variant in &product.variants {
            sqlx::query(
                r"
                INSERT INTO product_variant (product_id, title, price, sku)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(product_id)
            .bind(variant.title.trim())
            .bind(variant.price)
            .bind(variant.sku.as_deref())
            .execute(&mut *tx)
            .await?;
            result.variants += 1;
        }
    }

    tx.commit().await?;
    info!(
        hostname,
        products = result.products,
        variants = result.variants,
        removed = result.removed,
        "Catalog seeded"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
products:
  - title: Kettle
    description: Stainless steel
    variants:
      - title: Steel
        price: 300000
        sku: KT-STEEL
      - title: Glass
        price: 350000
  - title: Old teapot
    status: inactive
";

    #[test]
    fn test_parse_sample() {
        let catalog: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(catalog.products.len(), 2);
        assert_eq!(catalog.products[0].variants[0].sku.as_deref(), Some("KT-STEEL"));
        assert_eq!(catalog.products[0].status, ProductStatus::Active);
        assert_eq!(catalog.products[1].status, ProductStatus::Inactive);
        assert!(catalog.products[1].variants.is_empty());
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let catalog: CatalogFile = serde_yaml::from_str(
            r"
products:
  - title: '  '
    variants:
      - title: Broken
        price: -1
",
        )
        .unwrap();
        let errors = validate(&catalog);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("title and description are both empty"));
        assert!(errors[1].contains("price must not be negative"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let catalog = CatalogFile { products: vec![] };
        assert_eq!(validate(&catalog), vec!["catalog has no products".to_string()]);
    }
}
