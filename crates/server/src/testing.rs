//! Fakes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use shopvox_core::CurrencyCode;

use crate::config::SearchSettings;
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::functions::FunctionDispatcher;
use crate::search::SearchEngine;
use crate::store::memory::InMemoryStore;
use crate::store::{CartStore, CatalogStore};

/// Embedder that returns the same vector for every text, or always fails.
#[derive(Clone)]
pub struct FixedEmbedder {
    vector: Option<Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            vector: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector.clone().ok_or(EmbeddingError::RateLimited)
    }

    fn model(&self) -> &str {
        "fixed-test"
    }
}

/// A 2-d unit vector whose cosine similarity with `[1, 0]` is `similarity`.
pub fn unit_vector(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

fn dispatcher(store: &Arc<InMemoryStore>, embedder: FixedEmbedder) -> FunctionDispatcher {
    let catalog: Arc<dyn CatalogStore> = store.clone();
    let carts: Arc<dyn CartStore> = store.clone();
    let search = SearchEngine::new(
        Arc::clone(&catalog),
        Arc::new(embedder),
        &SearchSettings::default(),
        CurrencyCode::RUB,
    );
    FunctionDispatcher::new(catalog, carts, search)
}

/// Dispatcher over an empty in-memory store; every query embeds to `query_vector`.
pub fn dispatcher_with_store(query_vector: Vec<f32>) -> (FunctionDispatcher, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (dispatcher(&store, FixedEmbedder::new(query_vector)), store)
}

/// Dispatcher whose embedder always fails.
pub fn dispatcher_with_failing_embedder() -> (FunctionDispatcher, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (dispatcher(&store, FixedEmbedder::failing()), store)
}
