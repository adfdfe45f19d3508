//! Integration tests for Shopvox.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopvox-integration-tests
//! ```
//!
//! The tests run the full dispatcher and HTTP router against the in-memory
//! store and a scripted embedder, so no database or network is needed.
//!
//! # Test Categories
//!
//! - `search_scenarios` - ranking cascade, disambiguation and answer text
//! - `functions` - dispatcher envelopes, error codes and cart flows
//! - `http_api` - axum routes
//! - `indexing` - embedding backfill feeding search

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::Router;

use shopvox_core::CurrencyCode;
use shopvox_server::config::SearchSettings;
use shopvox_server::embeddings::{EmbeddingError, EmbeddingProvider};
use shopvox_server::functions::FunctionDispatcher;
use shopvox_server::routes;
use shopvox_server::search::SearchEngine;
use shopvox_server::state::AppState;
use shopvox_server::store::memory::InMemoryStore;
use shopvox_server::store::{CartStore, CatalogStore};

/// Embedder with canned vectors per text.
///
/// Unknown texts get the fallback vector, or fail with
/// `EmbeddingError::RateLimited` when no fallback is set.
#[derive(Default)]
pub struct ScriptedEmbedder {
    responses: Mutex<HashMap<String, Vec<f32>>>,
    fallback: Mutex<Option<Vec<f32>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` with `vector`.
    pub fn respond(&self, text: &str, vector: Vec<f32>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.to_string(), vector);
    }

    /// Answer every unknown text with `vector`.
    pub fn fallback(&self, vector: Vec<f32>) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = Some(vector);
    }

    /// Texts embedded so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
            .cloned();
        scripted
            .or_else(|| {
                self.fallback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .ok_or(EmbeddingError::RateLimited)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// A 2-d unit vector whose cosine similarity with `[1, 0]` is `similarity`.
#[must_use]
pub fn unit_vector(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

/// The query direction used by [`TestShop::new`].
#[must_use]
pub fn query_vector() -> Vec<f32> {
    vec![1.0, 0.0]
}

/// In-memory shop wired through the real dispatcher.
pub struct TestShop {
    pub store: Arc<InMemoryStore>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub dispatcher: FunctionDispatcher,
}

impl TestShop {
    /// Every query embeds to [`query_vector`]; prices render in RUB.
    #[must_use]
    pub fn new() -> Self {
        let embedder = ScriptedEmbedder::new();
        embedder.fallback(query_vector());
        Self::with_embedder(embedder, &SearchSettings::default())
    }

    #[must_use]
    pub fn with_embedder(embedder: ScriptedEmbedder, settings: &SearchSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(embedder);
        let catalog: Arc<dyn CatalogStore> = store.clone();
        let carts: Arc<dyn CartStore> = store.clone();
        let search = SearchEngine::new(
            Arc::clone(&catalog),
            embedder.clone(),
            settings,
            CurrencyCode::RUB,
        );
        Self {
            dispatcher: FunctionDispatcher::new(catalog, carts, search),
            store,
            embedder,
        }
    }

    /// The HTTP router over this shop, without a database pool.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes().with_state(AppState::from_parts(self.dispatcher.clone(), None))
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}
