//! Embedding maintenance: backfill of missing vectors and per-product reindex.
//!
//! Rows whose embedding is `NULL` are invisible to search. The backfill worker
//! finds them, embeds their text and writes the vectors back. A row that keeps
//! failing is reported and left `NULL`, so the next run retries it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use thiserror::Error;
use tracing::{info, instrument, warn};

use shopvox_core::{DomainId, ProductId};

use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::store::{CatalogStore, EmbeddingJob, EmbeddingTarget, RepositoryError};

/// Backfill worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Embedding calls in flight at once.
    pub concurrency: usize,
    /// Minimum spacing between embedding calls.
    pub delay: Duration,
    /// Attempts per row before it is reported as failed.
    pub max_attempts: u32,
    /// Rows fetched per store query.
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            delay: Duration::from_millis(200),
            max_attempts: 3,
            batch_size: 500,
        }
    }
}

/// A row that could not be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRow {
    pub target: EmbeddingTarget,
    pub reason: String,
}

/// Outcome of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: Vec<FailedRow>,
}

impl BackfillReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of recomputing one product's vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexReport {
    pub product_id: ProductId,
    pub embedded: usize,
    pub failed: Vec<FailedRow>,
}

#[derive(Debug, Error)]
enum RowError {
    #[error("row has no text to embed")]
    NoText,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Fills in missing embeddings with bounded concurrency and paced calls.
pub struct EmbeddingBackfill {
    store: Arc<dyn CatalogStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: BackfillConfig,
    /// `None` when calls are not paced.
    limiter: Option<DefaultDirectRateLimiter>,
}

impl EmbeddingBackfill {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            limiter: Quota::with_period(config.delay).map(RateLimiter::direct),
            config,
        }
    }

    /// Embed every row with a `NULL` vector, optionally limited to one domain.
    ///
    /// Per-row failures are collected in the report and never abort the run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the pending rows cannot be listed.
    #[instrument(skip(self), fields(domain_id = ?domain_id, model = self.embedder.model()))]
    pub async fn run(&self, domain_id: Option<DomainId>) -> Result<BackfillReport, RepositoryError> {
        let mut report = BackfillReport::default();
        let mut given_up: HashSet<EmbeddingTarget> = HashSet::new();

        loop {
            // Failed rows stay NULL, so over-fetch by their number to see new work.
            let limit = self.config.batch_size.saturating_add(given_up.len());
            let jobs: Vec<EmbeddingJob> = self
                .store
                .missing_embeddings(domain_id, limit)
                .await?
                .into_iter()
                .filter(|job| !given_up.contains(&job.target))
                .take(self.config.batch_size)
                .collect();
            if jobs.is_empty() {
                break;
            }

            info!(rows = jobs.len(), "Embedding batch");
            for (target, result) in self.process(jobs).await {
                match result {
                    Ok(()) => report.embedded += 1,
                    Err(e) => {
                        given_up.insert(target);
                        report.failed.push(FailedRow {
                            target,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            embedded = report.embedded,
            failed = report.failed.len(),
            "Embedding backfill finished"
        );
        Ok(report)
    }

    /// Recompute the vectors of one product and all of its variants.
    ///
    /// Existing vectors are cleared first. Each row is then embedded on its
    /// own, so a partial failure leaves only the failed rows `NULL` for the
    /// next backfill. Running it twice yields the same vectors.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product, or the
    /// store error if the product cannot be loaded or cleared.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn reindex_product(
        &self,
        product_id: ProductId,
    ) -> Result<ReindexReport, RepositoryError> {
        let found = self
            .store
            .find_product(None, product_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        self.store.clear_product_embeddings(product_id).await?;

        let product = &found.product;
        let jobs = std::iter::once(EmbeddingJob {
            target: EmbeddingTarget::Product(product.id),
            product_title: product.title.clone(),
            product_description: product.description.clone(),
            variant_title: None,
        })
        .chain(found.variants.iter().map(|variant| EmbeddingJob {
            target: EmbeddingTarget::Variant(variant.id),
            product_title: product.title.clone(),
            product_description: product.description.clone(),
            variant_title: Some(variant.title.clone()),
        }))
        .collect();

        let mut report = ReindexReport {
            product_id,
            embedded: 0,
            failed: Vec::new(),
        };
        for (target, result) in self.process(jobs).await {
            match result {
                Ok(()) => report.embedded += 1,
                Err(e) => report.failed.push(FailedRow {
                    target,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    async fn process(&self, jobs: Vec<EmbeddingJob>) -> Vec<(EmbeddingTarget, Result<(), RowError>)> {
        let mut results: Vec<_> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move { (index, job.target, self.embed_row(&job).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, target, result)| (target, result))
            .collect()
    }

    async fn embed_row(&self, job: &EmbeddingJob) -> Result<(), RowError> {
        let Some(text) = job.text() else {
            warn!(row = %job.target, "Skipping row without text");
            return Err(RowError::NoText);
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        let vector = loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            match self.embedder.embed(&text).await {
                Ok(vector) => break vector,
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(row = %job.target, attempt, error = %e, "Embedding failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(row = %job.target, attempt, error = %e, "Giving up on row");
                    return Err(e.into());
                }
            }
        };

        self.store
            .upsert_embedding(job.target, &vector)
            .await?;
        Ok(())
    }
}
