//! `PostgreSQL` implementations of the store traits.
//!
//! # Tables
//!
//! - `domain` - tenants, keyed by hostname
//! - `product` / `product_variant` - catalog rows with a nullable `vector(1536)` embedding
//! - `app_user`, `cart`, `cart_item` - shopper carts, one per user and domain
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p shopvox-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as`) because sqlx has no
//! pgvector type. Vectors are bound as `[x,y,...]` text and cast with `::vector`.

mod cart;
mod catalog;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use cart::PgCartStore;
pub use catalog::PgCatalogStore;

use crate::store::RepositoryError;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Check that the database answers.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Render a vector in pgvector's text input format.
#[must_use]
pub fn format_embedding(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(ToString::to_string).collect();
    format!("[{}]", values.join(","))
}

fn to_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> Result<usize, RepositoryError> {
    usize::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative row count: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_embedding() {
        assert_eq!(format_embedding(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(format_embedding(&[]), "[]");
    }

    #[test]
    fn test_to_count_rejects_negative() {
        assert_eq!(to_count(3).unwrap_or_default(), 3);
        assert!(matches!(to_count(-1), Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_to_limit_saturates() {
        assert_eq!(to_limit(usize::MAX), i64::MAX);
        assert_eq!(to_limit(10), 10);
    }
}
