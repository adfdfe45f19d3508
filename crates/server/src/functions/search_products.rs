//! `search_products`: semantic search over the shop's catalog.

use serde_json::Value;

use super::{ErrorCode, FunctionDispatcher, FunctionResponse, HandlerError, args};
use crate::search::{SearchError, search_unavailable_message};

impl FunctionDispatcher {
    pub(super) async fn search_products(
        &self,
        hostname: &str,
        args: &Value,
    ) -> Result<FunctionResponse, HandlerError> {
        let Some(query) = args::text(args, "query") else {
            return Err(HandlerError::rejected(
                ErrorCode::InvalidQuery,
                "Please tell me which product you are looking for.",
            ));
        };
        let domain = self.domain(hostname).await?;

        match self.search.search(&domain, query, args::limit(args)).await {
            Ok(outcome) => Ok(FunctionResponse::ok(outcome.response)
                .with("products", &outcome.products)?),
            Err(SearchError::EmptyQuery) => Err(HandlerError::rejected(
                ErrorCode::InvalidQuery,
                "Please tell me which product you are looking for.",
            )),
            Err(SearchError::Embedding(e)) => {
                tracing::error!(error = %e, "Query embedding failed");
                Err(HandlerError::rejected(
                    ErrorCode::SearchUnavailable,
                    search_unavailable_message(),
                ))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use crate::functions::ErrorCode;
    use crate::store::EmbeddingTarget;
    use crate::testing::{dispatcher_with_store, unit_vector};

    #[tokio::test]
    async fn test_search_returns_products_payload() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        let domain = store.add_domain("shop.test");
        let product = store.add_product(domain, "Kettle", Some("Electric kettle"));
        let variant = store.add_variant(product, "Steel", 350_000, Some("KT-STEEL"));
        store.set_embedding(EmbeddingTarget::Product(product), unit_vector(0.3));
        store.set_embedding(EmbeddingTarget::Variant(variant), unit_vector(0.9));

        let response = dispatcher
            .execute("search_products", &json!({"hostname": "shop.test", "query": "kettle"}))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.response, "Kettle Steel costs 3 500 ₽ (SKU: KT-STEEL).");
        let products = response.get("products").unwrap().as_array().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0]["id"], variant.as_i32());
        assert_eq!(products[0]["parentProductId"], product.as_i32());
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let (dispatcher, store) = dispatcher_with_store(vec![1.0, 0.0]);
        store.add_domain("shop.test");
        let response = dispatcher
            .execute("search_products", &json!({"hostname": "shop.test", "query": "  "}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::InvalidQuery));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_search_unavailable() {
        let (dispatcher, store) = crate::testing::dispatcher_with_failing_embedder();
        let domain = store.add_domain("shop.test");
        store.add_product(domain, "Kettle", None);

        let response = dispatcher
            .execute("search_products", &json!({"hostname": "shop.test", "query": "kettle"}))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error, Some(ErrorCode::SearchUnavailable));
        assert!(!response.response.is_empty());
    }
}
