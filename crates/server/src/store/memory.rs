//! In-memory catalog and cart store.
//!
//! Nearest-neighbour queries are an exhaustive cosine scan, which keeps the
//! ordering exact and deterministic. Used by the unit and integration tests and
//! handy for running the dispatcher without a database.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopvox_core::{
    CartId, CartItemId, DomainId, EntityKind, ProductId, ProductStatus, UserId, VariantId,
};

use super::{
    Cart, CartItem, CartItemUpsert, CartLine, CartStore, CatalogEntry, CatalogStore, Domain,
    EmbeddingJob, EmbeddingTarget, NearestEntity, NearestNeighbor, Product, ProductWithVariants,
    RepositoryError, Variant, VariantDetail,
};

/// Base timestamp for seeded products; each product is one second newer than
/// the previous one so "newest first" follows insertion order.
const SEED_EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Default)]
struct Inner {
    domains: BTreeMap<DomainId, Domain>,
    products: BTreeMap<ProductId, Stored<Product>>,
    variants: BTreeMap<VariantId, Stored<Variant>>,
    users: Vec<UserId>,
    carts: Vec<Cart>,
    items: Vec<CartItem>,
    next_id: i32,
    fail_retrieval: bool,
    embedding_writes: usize,
}

#[derive(Debug)]
struct Stored<T> {
    row: T,
    embedding: Option<Vec<f32>>,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe in-memory implementation of [`CatalogStore`] and [`CartStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Register a tenant.
    pub fn add_domain(&self, hostname: &str) -> DomainId {
        let mut inner = self.write();
        let id = DomainId::new(inner.next_id());
        inner.domains.insert(
            id,
            Domain {
                id,
                hostname: hostname.to_string(),
            },
        );
        id
    }

    /// Add an active product without an embedding.
    pub fn add_product(
        &self,
        domain_id: DomainId,
        title: &str,
        description: Option<&str>,
    ) -> ProductId {
        let mut inner = self.write();
        let raw = inner.next_id();
        let id = ProductId::new(raw);
        let created_at: DateTime<Utc> =
            DateTime::from_timestamp(SEED_EPOCH + i64::from(raw), 0).unwrap_or_default();
        inner.products.insert(
            id,
            Stored {
                row: Product {
                    id,
                    domain_id,
                    title: title.to_string(),
                    description: description.map(str::to_string),
                    status: ProductStatus::Active,
                    created_at,
                },
                embedding: None,
            },
        );
        id
    }

    /// Change a product's publication status.
    pub fn set_product_status(&self, product_id: ProductId, status: ProductStatus) {
        if let Some(product) = self.write().products.get_mut(&product_id) {
            product.row.status = status;
        }
    }

    /// Add a variant without an embedding.
    pub fn add_variant(
        &self,
        product_id: ProductId,
        title: &str,
        price: i64,
        sku: Option<&str>,
    ) -> VariantId {
        let mut inner = self.write();
        let id = VariantId::new(inner.next_id());
        inner.variants.insert(
            id,
            Stored {
                row: Variant {
                    id,
                    product_id,
                    title: title.to_string(),
                    price,
                    sku: sku.map(str::to_string),
                },
                embedding: None,
            },
        );
        id
    }

    /// Set a vector directly, bypassing the write counter.
    pub fn set_embedding(&self, target: EmbeddingTarget, vector: Vec<f32>) {
        let mut inner = self.write();
        match target {
            EmbeddingTarget::Product(id) => {
                if let Some(product) = inner.products.get_mut(&id) {
                    product.embedding = Some(vector);
                }
            }
            EmbeddingTarget::Variant(id) => {
                if let Some(variant) = inner.variants.get_mut(&id) {
                    variant.embedding = Some(vector);
                }
            }
        }
    }

    /// Current vector of a row.
    #[must_use]
    pub fn embedding(&self, target: EmbeddingTarget) -> Option<Vec<f32>> {
        let inner = self.read();
        match target {
            EmbeddingTarget::Product(id) => inner.products.get(&id)?.embedding.clone(),
            EmbeddingTarget::Variant(id) => inner.variants.get(&id)?.embedding.clone(),
        }
    }

    /// Register a user. The first user added is the default user.
    pub fn add_user(&self) -> UserId {
        let mut inner = self.write();
        let id = UserId::new(inner.next_id());
        inner.users.push(id);
        id
    }

    /// Make every `nearest_by_vector` call fail.
    pub fn fail_retrieval(&self, fail: bool) {
        self.write().fail_retrieval = fail;
    }

    /// Number of successful `upsert_embedding` calls.
    #[must_use]
    pub fn embedding_writes(&self) -> usize {
        self.read().embedding_writes
    }
}

/// Cosine distance in `[0, 2]`. Zero vectors are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn check_dimensions(stored: &[f32], query: &[f32]) -> Result<(), RepositoryError> {
    if stored.len() == query.len() {
        Ok(())
    } else {
        Err(RepositoryError::DataCorruption(format!(
            "different vector dimensions {} and {}",
            stored.len(),
            query.len()
        )))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_domain_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Option<Domain>, RepositoryError> {
        Ok(self
            .read()
            .domains
            .values()
            .find(|d| d.hostname == hostname)
            .cloned())
    }

    async fn domains(&self) -> Result<Vec<Domain>, RepositoryError> {
        Ok(self.read().domains.values().cloned().collect())
    }

    async fn nearest_by_vector(
        &self,
        domain_id: DomainId,
        vector: &[f32],
        kind: EntityKind,
        k: usize,
    ) -> Result<Vec<NearestNeighbor>, RepositoryError> {
        let inner = self.read();
        if inner.fail_retrieval {
            return Err(RepositoryError::Conflict("retrieval disabled".into()));
        }

        let mut rows = Vec::new();
        match kind {
            EntityKind::Product => {
                for stored in inner.products.values() {
                    let Some(embedding) = &stored.embedding else {
                        continue;
                    };
                    if stored.row.domain_id != domain_id {
                        continue;
                    }
                    check_dimensions(embedding, vector)?;
                    rows.push(NearestNeighbor {
                        entity: NearestEntity::Product {
                            id: stored.row.id,
                            title: stored.row.title.clone(),
                        },
                        distance: cosine_distance(embedding, vector),
                    });
                }
            }
            EntityKind::Variant => {
                for stored in inner.variants.values() {
                    let Some(embedding) = &stored.embedding else {
                        continue;
                    };
                    let Some(parent) = inner.products.get(&stored.row.product_id) else {
                        continue;
                    };
                    if parent.row.domain_id != domain_id {
                        continue;
                    }
                    check_dimensions(embedding, vector)?;
                    rows.push(NearestNeighbor {
                        entity: NearestEntity::Variant {
                            id: stored.row.id,
                            title: stored.row.title.clone(),
                            price: stored.row.price,
                            sku: stored.row.sku.clone(),
                            product_id: parent.row.id,
                            product_title: parent.row.title.clone(),
                        },
                        distance: cosine_distance(embedding, vector),
                    });
                }
            }
        }

        rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        rows.truncate(k);
        Ok(rows)
    }

    async fn upsert_embedding(
        &self,
        target: EmbeddingTarget,
        vector: &[f32],
    ) -> Result<(), RepositoryError> {
        let mut inner = self.write();
        let slot = match target {
            EmbeddingTarget::Product(id) => inner.products.get_mut(&id).map(|p| &mut p.embedding),
            EmbeddingTarget::Variant(id) => inner.variants.get_mut(&id).map(|v| &mut v.embedding),
        };
        let slot = slot.ok_or(RepositoryError::NotFound)?;
        *slot = Some(vector.to_vec());
        inner.embedding_writes += 1;
        Ok(())
    }

    async fn clear_product_embeddings(
        &self,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.write();
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(RepositoryError::NotFound)?;
        product.embedding = None;
        for variant in inner.variants.values_mut() {
            if variant.row.product_id == product_id {
                variant.embedding = None;
            }
        }
        Ok(())
    }

    async fn find_product(
        &self,
        domain_id: Option<DomainId>,
        product_id: ProductId,
    ) -> Result<Option<ProductWithVariants>, RepositoryError> {
        let inner = self.read();
        let Some(stored) = inner.products.get(&product_id) else {
            return Ok(None);
        };
        if domain_id.is_some_and(|d| d != stored.row.domain_id) {
            return Ok(None);
        }
        let variants = inner
            .variants
            .values()
            .filter(|v| v.row.product_id == product_id)
            .map(|v| v.row.clone())
            .collect();
        Ok(Some(ProductWithVariants {
            product: stored.row.clone(),
            variants,
        }))
    }

    async fn find_variant(
        &self,
        domain_id: DomainId,
        variant_id: VariantId,
    ) -> Result<Option<VariantDetail>, RepositoryError> {
        let inner = self.read();
        let Some(stored) = inner.variants.get(&variant_id) else {
            return Ok(None);
        };
        let Some(parent) = inner.products.get(&stored.row.product_id) else {
            return Ok(None);
        };
        if parent.row.domain_id != domain_id {
            return Ok(None);
        }
        Ok(Some(VariantDetail {
            variant: stored.row.clone(),
            product_title: parent.row.title.clone(),
            product_description: parent.row.description.clone(),
        }))
    }

    async fn count_active_products(&self, domain_id: DomainId) -> Result<u64, RepositoryError> {
        let count = self
            .read()
            .products
            .values()
            .filter(|p| p.row.domain_id == domain_id && p.row.status.is_active())
            .count();
        Ok(count as u64)
    }

    async fn list_active_products(
        &self,
        domain_id: DomainId,
        limit: usize,
        variants_per_product: usize,
    ) -> Result<Vec<CatalogEntry>, RepositoryError> {
        let inner = self.read();
        let mut products: Vec<&Product> = inner
            .products
            .values()
            .map(|p| &p.row)
            .filter(|p| p.domain_id == domain_id && p.status.is_active())
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        products.truncate(limit);

        let entries = products
            .into_iter()
            .map(|product| {
                let mut variants: Vec<Variant> = inner
                    .variants
                    .values()
                    .filter(|v| v.row.product_id == product.id)
                    .map(|v| v.row.clone())
                    .collect();
                variants.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
                let variant_count = variants.len();
                let min_price = variants.iter().map(|v| v.price).min();
                let max_price = variants.iter().map(|v| v.price).max();
                variants.truncate(variants_per_product);
                CatalogEntry {
                    product: product.clone(),
                    sample_variants: variants,
                    variant_count,
                    min_price,
                    max_price,
                }
            })
            .collect();
        Ok(entries)
    }

    async fn missing_embeddings(
        &self,
        domain_id: Option<DomainId>,
        limit: usize,
    ) -> Result<Vec<EmbeddingJob>, RepositoryError> {
        let inner = self.read();
        let in_scope = |product: &Product| domain_id.is_none_or(|d| d == product.domain_id);

        let products = inner
            .products
            .values()
            .filter(|p| p.embedding.is_none() && in_scope(&p.row))
            .map(|p| EmbeddingJob {
                target: EmbeddingTarget::Product(p.row.id),
                product_title: p.row.title.clone(),
                product_description: p.row.description.clone(),
                variant_title: None,
            });

        let variants = inner
            .variants
            .values()
            .filter(|v| v.embedding.is_none())
            .filter_map(|v| {
                let parent = &inner.products.get(&v.row.product_id)?.row;
                in_scope(parent).then(|| EmbeddingJob {
                    target: EmbeddingTarget::Variant(v.row.id),
                    product_title: parent.title.clone(),
                    product_description: parent.description.clone(),
                    variant_title: Some(v.row.title.clone()),
                })
            });

        Ok(products.chain(variants).take(limit).collect())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn resolve_user(
        &self,
        requested: Option<UserId>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let inner = self.read();
        Ok(match requested {
            Some(id) => inner.users.contains(&id).then_some(id),
            None => inner.users.first().copied(),
        })
    }

    async fn find_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Option<Cart>, RepositoryError> {
        Ok(self
            .read()
            .carts
            .iter()
            .find(|c| c.user_id == user_id && c.domain_id == domain_id)
            .copied())
    }

    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Cart, RepositoryError> {
        let mut inner = self.write();
        if let Some(cart) = inner
            .carts
            .iter()
            .find(|c| c.user_id == user_id && c.domain_id == domain_id)
        {
            return Ok(*cart);
        }
        let cart = Cart {
            id: CartId::generate(),
            user_id,
            domain_id,
        };
        inner.carts.push(cart);
        Ok(cart)
    }

    async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<CartItemUpsert, RepositoryError> {
        let mut inner = self.write();
        if !inner.carts.iter().any(|c| c.id == cart_id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(item) = inner
            .items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.variant_id == variant_id)
        {
            item.quantity = item.quantity.saturating_add(delta);
            return Ok(CartItemUpsert {
                item: *item,
                created: false,
            });
        }
        let item = CartItem {
            id: CartItemId::new(inner.next_id()),
            cart_id,
            variant_id,
            quantity: delta,
        };
        inner.items.push(item);
        Ok(CartItemUpsert {
            item,
            created: true,
        })
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let inner = self.read();
        inner
            .items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .map(|item| {
                let variant = &inner
                    .variants
                    .get(&item.variant_id)
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "cart item {} references missing variant {}",
                            item.id, item.variant_id
                        ))
                    })?
                    .row;
                let product_title = inner
                    .products
                    .get(&variant.product_id)
                    .map(|p| p.row.title.clone())
                    .unwrap_or_default();
                Ok(CartLine {
                    item: *item,
                    product_title,
                    variant_title: variant.title.clone(),
                    price: variant.price,
                    sku: variant.sku.clone(),
                })
            })
            .collect()
    }
}
