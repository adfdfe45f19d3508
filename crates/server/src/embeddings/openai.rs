//! `OpenAI` embedding client.
//!
//! Uses `text-embedding-3-small` by default with 1536 dimensions, matching the
//! `vector(1536)` columns created by the catalog migration. The model and the
//! dimension count are pinned in configuration: vectors produced by a
//! different model are not comparable with the ones already in the index.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::OpenAIConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Client for generating text embeddings via `OpenAI` API.
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingClient {
    /// Create a new embedding client.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::Config` if the API key contains invalid header
    /// characters or the HTTP client cannot be built.
    pub fn new(config: &OpenAIConfig) -> Result<Self, EmbeddingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|_| EmbeddingError::Config("API key is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_EMBEDDINGS_URL.to_string()),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    /// Generate embeddings for multiple texts in a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|t| t.trim()).collect(),
            dimensions: self.dimensions,
            encoding_format: "float",
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: EmbeddingResponse = response.json().await?;
        let mut data = response.data;
        // The API documents `index` ordering but does not promise it.
        data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for (i, emb) in embeddings.iter().enumerate() {
            if emb.len() != self.dimensions {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "embedding {i} has {} dimensions, expected {}",
                    emb.len(),
                    self.dimensions
                )));
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding data in response".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    dimensions: usize,
    encoding_format: &'a str,
}

/// Response from `OpenAI` embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Single embedding data in response.
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: vec!["iPhone 15"],
            dimensions: 1536,
            encoding_format: "float",
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"][0], "iPhone 15");
        assert_eq!(json["dimensions"], 1536);
    }

    #[test]
    fn test_response_deserialization_orders_by_index() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.5, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(body).expect("deserialize");
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![1.0, 0.0]);
    }
}
