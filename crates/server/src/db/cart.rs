//! Shopper and cart queries.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use shopvox_core::{CartId, CartItemId, DomainId, UserId, VariantId};

use crate::store::{Cart, CartItem, CartItemUpsert, CartLine, CartStore, RepositoryError};

/// Cart store over `PostgreSQL`.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip(self))]
    async fn resolve_user(
        &self,
        requested: Option<UserId>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id = match requested {
            Some(id) => {
                sqlx::query_scalar::<_, i32>("SELECT id FROM app_user WHERE id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i32>("SELECT id FROM app_user ORDER BY id LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(id.map(UserId::new))
    }

    #[instrument(skip(self), fields(user_id = %user_id, domain_id = %domain_id))]
    async fn find_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, domain_id
            FROM cart
            WHERE user_id = $1 AND domain_id = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(domain_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), fields(user_id = %user_id, domain_id = %domain_id))]
    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        domain_id: DomainId,
    ) -> Result<Cart, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO cart (id, user_id, domain_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, domain_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, domain_id
            ",
        )
        .bind(CartId::generate().as_uuid())
        .bind(user_id.as_i32())
        .bind(domain_id.as_i32())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, variant_id = %variant_id, delta))]
    async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<CartItemUpsert, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO cart_item (cart_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_id) DO UPDATE
                SET quantity = LEAST(cart_item.quantity::bigint + EXCLUDED.quantity, 2147483647)::int,
                    updated_at = NOW()
            RETURNING id, cart_id, variant_id, quantity, (xmax = 0) AS created
            ",
        )
        .bind(cart_id.as_uuid())
        .bind(variant_id.as_i32())
        .bind(delta)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict("cart or variant no longer exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(CartItemUpsert {
            created: row.created,
            item: CartItem {
                id: CartItemId::new(row.id),
                cart_id: CartId::from_uuid(row.cart_id),
                variant_id: VariantId::new(row.variant_id),
                quantity: row.quantity,
            },
        })
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.cart_id, ci.variant_id, ci.quantity,
                   p.title AS product_title, v.title AS variant_title, v.price, v.sku
            FROM cart_item ci
            JOIN product_variant v ON v.id = ci.variant_id
            JOIN product p ON p.id = v.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                item: CartItem {
                    id: CartItemId::new(r.id),
                    cart_id: CartId::from_uuid(r.cart_id),
                    variant_id: VariantId::new(r.variant_id),
                    quantity: r.quantity,
                },
                product_title: r.product_title,
                variant_title: r.variant_title,
                price: r.price,
                sku: r.sku,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: i32,
    domain_id: i32,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::from_uuid(row.id),
            user_id: UserId::new(row.user_id),
            domain_id: DomainId::new(row.domain_id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    cart_id: Uuid,
    variant_id: i32,
    quantity: i32,
    created: bool,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    cart_id: Uuid,
    variant_id: i32,
    quantity: i32,
    product_title: String,
    variant_title: String,
    price: i64,
    sku: Option<String>,
}
