//! Embedding maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! # Embed every row with a missing vector
//! svx embeddings backfill
//!
//! # Only one shop
//! svx embeddings backfill --hostname shop.example.com
//!
//! # Recompute a product and its variants after an edit
//! svx embeddings reindex 42
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPVOX_DATABASE_URL` (or `DATABASE_URL`)
//! - `OPENAI_API_KEY`, `OPENAI_EMBEDDING_MODEL`, `OPENAI_EMBEDDING_DIMENSIONS`
//! - `BACKFILL_CONCURRENCY`, `BACKFILL_DELAY_MS`, `BACKFILL_MAX_ATTEMPTS`, `BACKFILL_BATCH_SIZE`

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, info};

use shopvox_core::ProductId;
use shopvox_server::config::{OpenAIConfig, backfill_from_env, get_database_url};
use shopvox_server::db::{self, PgCatalogStore};
use shopvox_server::embeddings::OpenAiEmbeddingClient;
use shopvox_server::indexing::{BackfillReport, EmbeddingBackfill, FailedRow};
use shopvox_server::store::CatalogStore;

/// Connect to the database using the server's environment variables.
///
/// # Errors
///
/// Returns an error if the URL is missing or the database is unreachable.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let database_url = get_database_url("SHOPVOX_DATABASE_URL")?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");
    Ok(pool)
}

fn worker(pool: &PgPool) -> Result<EmbeddingBackfill, Box<dyn std::error::Error>> {
    let openai = OpenAIConfig::from_env()?;
    let config = backfill_from_env()?;
    info!(
        model = %openai.model,
        concurrency = config.concurrency,
        delay_ms = u64::try_from(config.delay.as_millis()).unwrap_or(u64::MAX),
        "Embedding worker configured"
    );

    let store: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
    let embedder = Arc::new(OpenAiEmbeddingClient::new(&openai)?);
    Ok(EmbeddingBackfill::new(store, embedder, config))
}

/// Embed every row whose vector is missing.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the hostname is unknown,
/// or the pending rows cannot be listed. Rows that fail to embed are logged
/// and reported but do not fail the command.
pub async fn backfill(
    pool: &PgPool,
    hostname: Option<&str>,
) -> Result<BackfillReport, Box<dyn std::error::Error>> {
    let worker = worker(pool)?;

    let domain_id = match hostname {
        Some(hostname) => {
            let store = PgCatalogStore::new(pool.clone());
            let domain = store
                .find_domain_by_hostname(hostname)
                .await?
                .ok_or_else(|| format!("Unknown hostname: {hostname}"))?;
            Some(domain.id)
        }
        None => None,
    };

    let report = worker.run(domain_id).await?;
    info!("Backfill complete!");
    info!("  Rows embedded: {}", report.embedded);
    log_failures(&report.failed);
    Ok(report)
}

/// Recompute the vectors of one product and its variants.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the product does not exist.
pub async fn reindex(pool: &PgPool, product_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let product_id =
        ProductId::from_positive(product_id).ok_or("Product id must be a positive integer")?;

    let report = worker(pool)?.reindex_product(product_id).await?;
    info!("Reindex complete!");
    info!("  Rows embedded: {}", report.embedded);
    log_failures(&report.failed);
    Ok(())
}

fn log_failures(failed: &[FailedRow]) {
    if failed.is_empty() {
        return;
    }
    error!("  Failed rows (left empty, retried by the next backfill): {}", failed.len());
    for row in failed {
        error!("    - {}: {}", row.target, row.reason);
    }
}
