//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::{PgCartStore, PgCatalogStore};
use crate::embeddings::{EmbeddingError, OpenAiEmbeddingClient};
use crate::functions::FunctionDispatcher;
use crate::search::SearchEngine;
use crate::store::{CartStore, CatalogStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    dispatcher: FunctionDispatcher,
    pool: Option<PgPool>,
}

impl AppState {
    /// Wire the `PostgreSQL` stores and the `OpenAI` embedder together.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::Config` if the HTTP client cannot be built.
    pub fn new(config: &ServerConfig, pool: PgPool) -> Result<Self, EmbeddingError> {
        let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
        let carts: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
        let embedder = Arc::new(OpenAiEmbeddingClient::new(&config.openai)?);

        let search = SearchEngine::new(
            Arc::clone(&catalog),
            embedder,
            &config.search,
            config.currency,
        );
        let dispatcher = FunctionDispatcher::new(catalog, carts, search);
        Ok(Self::from_parts(dispatcher, Some(pool)))
    }

    /// State over an already-built dispatcher. Without a pool the readiness
    /// probe always reports ready.
    #[must_use]
    pub fn from_parts(dispatcher: FunctionDispatcher, pool: Option<PgPool>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { dispatcher, pool }),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &FunctionDispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
