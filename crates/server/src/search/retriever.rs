//! Domain-scoped nearest-neighbour retrieval over products and variants.

use std::sync::Arc;

use tracing::instrument;

use shopvox_core::{DomainId, EntityKind};

use super::SearchCandidate;
use crate::store::{CatalogStore, RepositoryError};

/// Issues nearest-neighbour queries against the catalog store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn CatalogStore>,
    candidate_multiplier: usize,
}

impl Retriever {
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, candidate_multiplier: usize) -> Self {
        Self {
            store,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }

    /// Candidates of one kind, ascending distance (descending similarity).
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    #[instrument(skip(self, vector), fields(dimensions = vector.len()))]
    pub async fn retrieve(
        &self,
        domain_id: DomainId,
        vector: &[f32],
        kind: EntityKind,
        k: usize,
    ) -> Result<Vec<SearchCandidate>, RepositoryError> {
        let rows = self
            .store
            .nearest_by_vector(domain_id, vector, kind, k)
            .await?;
        Ok(rows.into_iter().map(SearchCandidate::from).collect())
    }

    /// Products then variants, `limit * candidate_multiplier` of each.
    ///
    /// Both queries run concurrently; the merge order is fixed regardless of
    /// which finishes first.
    ///
    /// # Errors
    ///
    /// Returns the first store error.
    pub async fn retrieve_pool(
        &self,
        domain_id: DomainId,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, RepositoryError> {
        let k = limit.saturating_mul(self.candidate_multiplier);
        let (products, variants) = tokio::join!(
            self.retrieve(domain_id, vector, EntityKind::Product, k),
            self.retrieve(domain_id, vector, EntityKind::Variant, k),
        );
        let mut pool = products?;
        pool.extend(variants?);
        Ok(pool)
    }
}
