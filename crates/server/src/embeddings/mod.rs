//! Text embeddings for semantic catalog search.
//!
//! The search path and the indexing path both depend on an
//! [`EmbeddingProvider`]; production uses [`OpenAiEmbeddingClient`], tests
//! inject a deterministic fake.
//!
//! ## Embedding text
//!
//! - Product: `title description`
//! - Variant: `product title` + `variant title` + `product description`
//!
//! A variant's text includes its parent's fields, so any change to the parent
//! invalidates every child vector.

mod error;
mod openai;

use async_trait::async_trait;

pub use error::EmbeddingError;
pub use openai::OpenAiEmbeddingClient;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default vector length. Must match the `vector(N)` columns in the catalog schema.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for a fixed model version and must
/// never return an empty vector in place of an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, quota, or response-shape failures.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier the vectors belong to.
    fn model(&self) -> &str;
}

/// Text embedded for a product, or `None` when there is nothing to embed.
#[must_use]
pub fn product_embedding_text(title: &str, description: Option<&str>) -> Option<String> {
    let text = join_parts(&[title, description.unwrap_or_default()]);
    (!text.is_empty()).then_some(text)
}

/// Text embedded for a variant.
#[must_use]
pub fn variant_embedding_text(
    product_title: &str,
    variant_title: &str,
    product_description: Option<&str>,
) -> String {
    join_parts(&[
        product_title,
        variant_title,
        product_description.unwrap_or_default(),
    ])
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
