//! Catalog queries: domains, products, variants and their embeddings.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use shopvox_core::{DomainId, EntityKind, ProductId, ProductStatus, VariantId};

use super::{format_embedding, to_count, to_limit};
use crate::store::{
    CatalogEntry, CatalogStore, Domain, EmbeddingJob, EmbeddingTarget, NearestEntity,
    NearestNeighbor, Product, ProductWithVariants, RepositoryError, Variant, VariantDetail,
};

/// Catalog store over `PostgreSQL` + pgvector.
///
/// Hostname lookups are cached for 5 minutes; unknown hostnames are not cached.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
    domains: Cache<String, Domain>,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let domains = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { pool, domains }
    }

    async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, title, price, sku
            FROM product_variant
            WHERE product_id = $1
            ORDER BY id
            ",
        )
        .bind(product_id.as_i32())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self))]
    async fn find_domain_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Option<Domain>, RepositoryError> {
        if let Some(domain) = self.domains.get(hostname).await {
            return Ok(Some(domain));
        }

        let row = sqlx::query_as::<_, DomainRow>(
            r"
            SELECT id, hostname
            FROM domain
            WHERE hostname = $1
            ",
        )
        .bind(hostname)
        .fetch_optional(&self.pool)
        .await?;

        let domain = row.map(Domain::from);
        if let Some(domain) = &domain {
            self.domains
                .insert(hostname.to_string(), domain.clone())
                .await;
        }
        Ok(domain)
    }

    #[instrument(skip(self))]
    async fn domains(&self) -> Result<Vec<Domain>, RepositoryError> {
        let rows = sqlx::query_as::<_, DomainRow>("SELECT id, hostname FROM domain ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, vector), fields(domain_id = %domain_id, kind = %kind, k))]
    async fn nearest_by_vector(
        &self,
        domain_id: DomainId,
        vector: &[f32],
        kind: EntityKind,
        k: usize,
    ) -> Result<Vec<NearestNeighbor>, RepositoryError> {
        let embedding = format_embedding(vector);
        let neighbors: Vec<NearestNeighbor> = match kind {
            EntityKind::Product => sqlx::query_as::<_, NearestProductRow>(
                r"
                SELECT id, title, (embedding <=> $1::vector)::float8 AS distance
                FROM product
                WHERE domain_id = $2
                  AND embedding IS NOT NULL
                ORDER BY embedding <=> $1::vector, id
                LIMIT $3
                ",
            )
            .bind(&embedding)
            .bind(domain_id.as_i32())
            .bind(to_limit(k))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
            EntityKind::Variant => sqlx::query_as::<_, NearestVariantRow>(
                r"
                SELECT v.id, v.title, v.price, v.sku,
                       p.id AS product_id, p.title AS product_title,
                       (v.embedding <=> $1::vector)::float8 AS distance
                FROM product_variant v
                JOIN product p ON p.id = v.product_id
                WHERE p.domain_id = $2
                  AND v.embedding IS NOT NULL
                ORDER BY v.embedding <=> $1::vector, v.id
                LIMIT $3
                ",
            )
            .bind(&embedding)
            .bind(domain_id.as_i32())
            .bind(to_limit(k))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        };

        debug!(count = neighbors.len(), "Nearest neighbours fetched");
        Ok(neighbors)
    }

    #[instrument(skip(self, vector), fields(row = %target, dimensions = vector.len()))]
    async fn upsert_embedding(
        &self,
        target: EmbeddingTarget,
        vector: &[f32],
    ) -> Result<(), RepositoryError> {
        let (sql, id) = match target {
            EmbeddingTarget::Product(id) => (
                "UPDATE product SET embedding = $1::vector, updated_at = NOW() WHERE id = $2",
                id.as_i32(),
            ),
            EmbeddingTarget::Variant(id) => (
                "UPDATE product_variant SET embedding = $1::vector, updated_at = NOW() WHERE id = $2",
                id.as_i32(),
            ),
        };

        let result = sqlx::query(sql)
            .bind(format_embedding(vector))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn clear_product_embeddings(
        &self,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE product SET embedding = NULL WHERE id = $1")
            .bind(product_id.as_i32())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("UPDATE product_variant SET embedding = NULL WHERE product_id = $1")
            .bind(product_id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn find_product(
        &self,
        domain_id: Option<DomainId>,
        product_id: ProductId,
    ) -> Result<Option<ProductWithVariants>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, domain_id, title, description, status, created_at
            FROM product
            WHERE id = $1
              AND ($2::int IS NULL OR domain_id = $2)
            ",
        )
        .bind(product_id.as_i32())
        .bind(domain_id.map(|d| d.as_i32()))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let variants = self.variants_of(product_id).await?;
        Ok(Some(ProductWithVariants {
            product: row.into(),
            variants,
        }))
    }

    #[instrument(skip(self), fields(domain_id = %domain_id, variant_id = %variant_id))]
    async fn find_variant(
        &self,
        domain_id: DomainId,
        variant_id: VariantId,
    ) -> Result<Option<VariantDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantDetailRow>(
            r"
            SELECT v.id, v.product_id, v.title, v.price, v.sku,
                   p.title AS product_title, p.description AS product_description
            FROM product_variant v
            JOIN product p ON p.id = v.product_id
            WHERE v.id = $1
              AND p.domain_id = $2
            ",
        )
        .bind(variant_id.as_i32())
        .bind(domain_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| VariantDetail {
            variant: Variant {
                id: VariantId::new(r.id),
                product_id: ProductId::new(r.product_id),
                title: r.title,
                price: r.price,
                sku: r.sku,
            },
            product_title: r.product_title,
            product_description: r.product_description,
        }))
    }

    #[instrument(skip(self), fields(domain_id = %domain_id))]
    async fn count_active_products(&self, domain_id: DomainId) -> Result<u64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM product WHERE domain_id = $1 AND status = 'active'",
        )
        .bind(domain_id.as_i32())
        .fetch_one(&self.pool)
        .await?;
        u64::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative row count: {count}")))
    }

    #[instrument(skip(self), fields(domain_id = %domain_id, limit, variants_per_product))]
    async fn list_active_products(
        &self,
        domain_id: DomainId,
        limit: usize,
        variants_per_product: usize,
    ) -> Result<Vec<CatalogEntry>, RepositoryError> {
        let products = sqlx::query_as::<_, CatalogRow>(
            r"
            SELECT p.id, p.domain_id, p.title, p.description, p.status, p.created_at,
                   COUNT(v.id) AS variant_count,
                   MIN(v.price) AS min_price,
                   MAX(v.price) AS max_price
            FROM product p
            LEFT JOIN product_variant v ON v.product_id = p.id
            WHERE p.domain_id = $1
              AND p.status = 'active'
            GROUP BY p.id
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2
            ",
        )
        .bind(domain_id.as_i32())
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = products.iter().map(|p| p.id).collect();
        let samples = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, title, price, sku
            FROM (
                SELECT id, product_id, title, price, sku,
                       ROW_NUMBER() OVER (PARTITION BY product_id ORDER BY price, id) AS rank
                FROM product_variant
                WHERE product_id = ANY($1)
            ) ranked
            WHERE rank <= $2
            ORDER BY product_id, price, id
            ",
        )
        .bind(&ids)
        .bind(to_limit(variants_per_product))
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<i32, Vec<Variant>> = HashMap::new();
        for row in samples {
            by_product.entry(row.product_id).or_default().push(row.into());
        }

        products
            .into_iter()
            .map(|row| {
                let sample_variants = by_product.remove(&row.id).unwrap_or_default();
                Ok(CatalogEntry {
                    variant_count: to_count(row.variant_count)?,
                    min_price: row.min_price,
                    max_price: row.max_price,
                    sample_variants,
                    product: Product {
                        id: ProductId::new(row.id),
                        domain_id: DomainId::new(row.domain_id),
                        title: row.title,
                        description: row.description,
                        status: row.status,
                        created_at: row.created_at,
                    },
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(domain_id = ?domain_id, limit))]
    async fn missing_embeddings(
        &self,
        domain_id: Option<DomainId>,
        limit: usize,
    ) -> Result<Vec<EmbeddingJob>, RepositoryError> {
        let domain = domain_id.map(|d| d.as_i32());

        let products = sqlx::query_as::<_, MissingProductRow>(
            r"
            SELECT id, title, description
            FROM product
            WHERE embedding IS NULL
              AND ($1::int IS NULL OR domain_id = $1)
            ORDER BY id
            LIMIT $2
            ",
        )
        .bind(domain)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut jobs: Vec<EmbeddingJob> = products
            .into_iter()
            .map(|r| EmbeddingJob {
                target: EmbeddingTarget::Product(ProductId::new(r.id)),
                product_title: r.title,
                product_description: r.description,
                variant_title: None,
            })
            .collect();

        let remaining = limit.saturating_sub(jobs.len());
        if remaining == 0 {
            return Ok(jobs);
        }

        let variants = sqlx::query_as::<_, MissingVariantRow>(
            r"
            SELECT v.id, v.title, p.title AS product_title, p.description AS product_description
            FROM product_variant v
            JOIN product p ON p.id = v.product_id
            WHERE v.embedding IS NULL
              AND ($1::int IS NULL OR p.domain_id = $1)
            ORDER BY v.id
            LIMIT $2
            ",
        )
        .bind(domain)
        .bind(to_limit(remaining))
        .fetch_all(&self.pool)
        .await?;

        jobs.extend(variants.into_iter().map(|r| EmbeddingJob {
            target: EmbeddingTarget::Variant(VariantId::new(r.id)),
            product_title: r.product_title,
            product_description: r.product_description,
            variant_title: Some(r.title),
        }));
        Ok(jobs)
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DomainRow {
    id: i32,
    hostname: String,
}

impl From<DomainRow> for Domain {
    fn from(row: DomainRow) -> Self {
        Self {
            id: DomainId::new(row.id),
            hostname: row.hostname,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    domain_id: i32,
    title: String,
    description: Option<String>,
    status: ProductStatus,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            domain_id: DomainId::new(row.domain_id),
            title: row.title,
            description: row.description,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CatalogRow {
    id: i32,
    domain_id: i32,
    title: String,
    description: Option<String>,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    variant_count: i64,
    min_price: Option<i64>,
    max_price: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    title: String,
    price: i64,
    sku: Option<String>,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            title: row.title,
            price: row.price,
            sku: row.sku,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantDetailRow {
    id: i32,
    product_id: i32,
    title: String,
    price: i64,
    sku: Option<String>,
    product_title: String,
    product_description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct NearestProductRow {
    id: i32,
    title: String,
    distance: f64,
}

impl From<NearestProductRow> for NearestNeighbor {
    fn from(row: NearestProductRow) -> Self {
        Self {
            entity: NearestEntity::Product {
                id: ProductId::new(row.id),
                title: row.title,
            },
            distance: row.distance,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NearestVariantRow {
    id: i32,
    title: String,
    price: i64,
    sku: Option<String>,
    product_id: i32,
    product_title: String,
    distance: f64,
}

impl From<NearestVariantRow> for NearestNeighbor {
    fn from(row: NearestVariantRow) -> Self {
        Self {
            entity: NearestEntity::Variant {
                id: VariantId::new(row.id),
                title: row.title,
                price: row.price,
                sku: row.sku,
                product_id: ProductId::new(row.product_id),
                product_title: row.product_title,
            },
            distance: row.distance,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MissingProductRow {
    id: i32,
    title: String,
    description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MissingVariantRow {
    id: i32,
    title: String,
    product_title: String,
    product_description: Option<String>,
}
