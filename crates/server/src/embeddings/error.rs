//! Error types for embedding generation.

use thiserror::Error;

/// Errors that can occur while turning text into an embedding vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("embedding API error ({status}): {body}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Raw response body, for logs.
        body: String,
    },

    /// The provider asked us to slow down.
    #[error("rate limited by embedding provider")]
    RateLimited,

    /// Response parsed but did not contain what we asked for.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Nothing to embed.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// Client could not be constructed from configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidResponse(_) | Self::EmptyInput | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::RateLimited.is_transient());
        assert!(
            EmbeddingError::Api {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !EmbeddingError::Api {
                status: 401,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!EmbeddingError::EmptyInput.is_transient());
    }
}
