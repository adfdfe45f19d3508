//! Semantic product search.
//!
//! # Pipeline
//!
//! 1. Embed the query with the configured [`EmbeddingProvider`]
//! 2. [`Retriever`] fetches the nearest products and variants of the domain
//! 3. [`Ranker`] applies the tier cascade and the disambiguation rule
//! 4. [`compose_response`] renders the answer text
//!
//! Embedding failures surface as [`SearchError::Embedding`]. Store failures
//! during retrieval degrade to an empty result so the assistant keeps talking.

mod candidate;
mod compose;
mod ranker;
mod retriever;

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, warn};

use shopvox_core::CurrencyCode;

pub use candidate::{SearchCandidate, similarity_from_distance};
pub use compose::{
    compose_response, empty_catalog_message, not_found_message, search_unavailable_message,
};
pub use ranker::{
    Ranker, Ranking, RankingConfig, ResultGroup, Tier, TierMatcher, group_by_product,
};
pub use retriever::Retriever;

use crate::config::SearchSettings;
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::store::{CatalogStore, Domain};

/// Errors that abort a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Result of a search: the answer text plus the selected candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub response: String,
    pub products: Vec<SearchCandidate>,
    pub ranking: Ranking,
}

/// Embeds, retrieves, ranks and composes.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn CatalogStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    ranker: Ranker,
    default_limit: usize,
    currency: CurrencyCode,
}

impl SearchEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: &SearchSettings,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            retriever: Retriever::new(Arc::clone(&store), settings.candidate_multiplier),
            ranker: Ranker::new(&settings.ranking),
            default_limit: settings.result_limit.max(1),
            store,
            embedder,
            currency,
        }
    }

    /// Limit used when the caller does not pass one.
    #[must_use]
    pub const fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Currency prices are rendered in.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Search one domain's catalog.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::EmptyQuery` for a blank query and
    /// `SearchError::Embedding` when the query cannot be embedded.
    #[instrument(
        skip(self, query),
        fields(domain_id = %domain.id, query_len = query.len(), limit)
    )]
    pub async fn search(
        &self,
        domain: &Domain,
        query: &str,
        limit: Option<usize>,
    ) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = limit.filter(|l| *l > 0).unwrap_or(self.default_limit);

        match self.store.count_active_products(domain.id).await {
            Ok(0) => {
                return Ok(SearchOutcome {
                    response: empty_catalog_message(),
                    products: Vec::new(),
                    ranking: Ranking::default(),
                });
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to count active products, searching anyway"),
        }

        let vector = self.embedder.embed(query).await?;

        let pool = match self.retriever.retrieve_pool(domain.id, &vector, limit).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "Catalog retrieval failed, returning no results");
                Vec::new()
            }
        };
        let pool_size = pool.len();

        let ranking = self.ranker.rank(pool, query, limit);
        tracing::debug!(
            pool_size,
            selected = ranking.groups.iter().map(|g| g.members.len()).sum::<usize>(),
            tier = ?ranking.tier.map(|t| t.matcher),
            disambiguated = ranking.disambiguated,
            "Ranked search candidates"
        );

        Ok(SearchOutcome {
            response: compose_response(&ranking, query, self.currency),
            products: ranking.candidates(),
            ranking,
        })
    }
}
