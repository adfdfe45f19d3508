//! Storage interfaces consumed by the search engine and function handlers.
//!
//! The engine never talks to a database handle directly. It is given an
//! `Arc<dyn CatalogStore>` and an `Arc<dyn CartStore>`:
//!
//! - [`crate::db::PgCatalogStore`] / [`crate::db::PgCartStore`] - `PostgreSQL` + pgvector
//! - [`memory::InMemoryStore`] - exhaustive cosine scan, used by tests and local demos
//!
//! Every catalog query is scoped to one [`Domain`]. Implementations must never
//! return rows from another domain, and must never return a row whose
//! embedding is `NULL` from [`CatalogStore::nearest_by_vector`].

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use shopvox_core::{
    CartId, CartItemId, DomainId, EntityKind, ProductId, ProductStatus, UserId, VariantId,
};

use crate::embeddings::{product_embedding_text, variant_embedding_text};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

// =============================================================================
// Catalog Models
// =============================================================================

/// A tenant, identified by the hostname its assistant is embedded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub id: DomainId,
    pub hostname: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub domain_id: DomainId,
    pub title: String,
    pub description: Option<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub title: String,
    /// Price in minor currency units.
    pub price: i64,
    pub sku: Option<String>,
}

/// A product together with its variants (ordered by id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductWithVariants {
    pub product: Product,
    pub variants: Vec<Variant>,
}

/// A variant resolved together with its parent product's text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDetail {
    pub variant: Variant,
    pub product_title: String,
    pub product_description: Option<String>,
}

/// One product row of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product: Product,
    /// Cheapest variants first, capped by the caller's sample size.
    pub sample_variants: Vec<Variant>,
    pub variant_count: usize,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

/// A row returned from a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNeighbor {
    pub entity: NearestEntity,
    /// Cosine distance to the query vector.
    pub distance: f64,
}

/// The entity a nearest-neighbour row refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NearestEntity {
    Product {
        id: ProductId,
        title: String,
    },
    Variant {
        id: VariantId,
        title: String,
        price: i64,
        sku: Option<String>,
        product_id: ProductId,
        product_title: String,
    },
}

/// Row whose embedding column is written by the indexing worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingTarget {
    Product(ProductId),
    Variant(VariantId),
}

impl EmbeddingTarget {
    /// Entity kind of the target row.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Product(_) => EntityKind::Product,
            Self::Variant(_) => EntityKind::Variant,
        }
    }
}

impl std::fmt::Display for EmbeddingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product:{id}"),
            Self::Variant(id) => write!(f, "variant:{id}"),
        }
    }
}

/// A row with a missing embedding plus the fields its text is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingJob {
    pub target: EmbeddingTarget,
    pub product_title: String,
    pub product_description: Option<String>,
    /// Set for variant jobs only.
    pub variant_title: Option<String>,
}

impl EmbeddingJob {
    /// Text to embed for this row, or `None` when the row has no text at all.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match (&self.target, &self.variant_title) {
            (EmbeddingTarget::Variant(_), Some(variant_title)) => {
                let text = variant_embedding_text(
                    &self.product_title,
                    variant_title,
                    self.product_description.as_deref(),
                );
                (!text.is_empty()).then_some(text)
            }
            _ => product_embedding_text(&self.product_title, self.product_description.as_deref()),
        }
    }
}

// =============================================================================
// Cart Models
// =============================================================================

/// A shopping cart; one per user and domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub domain_id: DomainId,
}

/// A cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub variant_id: VariantId,
    pub quantity: i32,
}

/// Result of adding a quantity to a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemUpsert {
    pub item: CartItem,
    /// `true` when the line did not exist before.
    pub created: bool,
}

/// A cart line joined with catalog data for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item: CartItem,
    pub product_title: String,
    pub variant_title: String,
    pub price: i64,
    pub sku: Option<String>,
}

// =============================================================================
// Store Traits
// =============================================================================

/// Read access to the catalog plus embedding maintenance.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a tenant by hostname.
    async fn find_domain_by_hostname(&self, hostname: &str)
    -> Result<Option<Domain>, RepositoryError>;

    /// All tenants, ordered by id.
    async fn domains(&self) -> Result<Vec<Domain>, RepositoryError>;

    /// Up to `k` rows of `kind` in `domain_id` ordered by ascending cosine
    /// distance to `vector`. Rows without an embedding are excluded.
    async fn nearest_by_vector(
        &self,
        domain_id: DomainId,
        vector: &[f32],
        kind: EntityKind,
        k: usize,
    ) -> Result<Vec<NearestNeighbor>, RepositoryError>;

    /// Store the embedding for one row.
    async fn upsert_embedding(
        &self,
        target: EmbeddingTarget,
        vector: &[f32],
    ) -> Result<(), RepositoryError>;

    /// Null the vectors of a product and all of its variants.
    async fn clear_product_embeddings(&self, product_id: ProductId)
    -> Result<(), RepositoryError>;

    /// A product with all its variants. `domain_id = None` skips tenant scoping
    /// (maintenance paths only).
    async fn find_product(
        &self,
        domain_id: Option<DomainId>,
        product_id: ProductId,
    ) -> Result<Option<ProductWithVariants>, RepositoryError>;

    /// A variant whose parent product belongs to `domain_id`.
    async fn find_variant(
        &self,
        domain_id: DomainId,
        variant_id: VariantId,
    ) -> Result<Option<VariantDetail>, RepositoryError>;

    /// Number of active products in a domain.
    async fn count_active_products(&self, domain_id: DomainId) -> Result<u64, RepositoryError>;

    /// Newest active products first, each with its cheapest variants.
    async fn list_active_products(
        &self,
        domain_id: DomainId,
        limit: usize,
        variants_per_product: usize,
    ) -> Result<Vec<CatalogEntry>, RepositoryError>;

    /// Rows whose embedding is `NULL`, products before variants, by id.
    async fn missing_embeddings(
        &self,
        domain_id: Option<DomainId>,
        limit: usize,
    ) -> Result<Vec<EmbeddingJob>, RepositoryError>;
}

/// Cart persistence used by the cart functions.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Resolve the acting user: the requested one if it exists, otherwise the
    /// default user. `None` when no such user exists.
    async fn resolve_user(&self, requested: Option<UserId>)
    -> Result<Option<UserId>, RepositoryError>;

    /// The user's cart for a domain, if one was created.
    async fn find_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Option<Cart>, RepositoryError>;

    /// The user's cart for a domain, created on first use.
    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Cart, RepositoryError>;

    /// Add `delta` to the line for `variant_id`, creating it when absent.
    async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<CartItemUpsert, RepositoryError>;

    /// All lines of a cart, in insertion order.
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError>;
}
