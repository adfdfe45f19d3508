//! Named functions invoked by the conversational orchestrator.
//!
//! The orchestrator sends `{operation, arguments}`; [`FunctionDispatcher`]
//! routes it to one of:
//!
//! - `search_products` - semantic search with disambiguation
//! - `add_to_cart` - add a variant to the shopper's cart
//! - `get_cart_info` - cart contents and totals
//! - `browse_catalog` - overview of the newest products
//! - `get_product_info` - price of one product or variant
//!
//! Every handler answers with a [`FunctionResponse`]. Expected failures
//! (unknown shop, bad ids, missing rows) are envelopes with an [`ErrorCode`];
//! only an unknown function name is a [`DispatchError`].

mod add_to_cart;
pub mod args;
mod browse_catalog;
pub mod definitions;
mod envelope;
mod get_cart_info;
mod get_product_info;
mod search_products;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, instrument};

use shopvox_core::{CurrencyCode, UserId};

pub use definitions::{FunctionDefinition, all_functions, get_function_by_name};
pub use envelope::{ErrorCode, FunctionResponse};

use crate::search::SearchEngine;
use crate::store::{CartStore, CatalogStore, Domain, RepositoryError};

/// Variant title shop platforms assign to products without options.
pub const DEFAULT_VARIANT_TITLE: &str = "Default Title";

/// A function invocation as sent by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The functions this service implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchProducts,
    AddToCart,
    GetCartInfo,
    BrowseCatalog,
    GetProductInfo,
}

impl Operation {
    /// Every operation, in advertised order.
    pub const ALL: [Self; 5] = [
        Self::SearchProducts,
        Self::AddToCart,
        Self::GetCartInfo,
        Self::BrowseCatalog,
        Self::GetProductInfo,
    ];

    /// Wire name of the operation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SearchProducts => "search_products",
            Self::AddToCart => "add_to_cart",
            Self::GetCartInfo => "get_cart_info",
            Self::BrowseCatalog => "browse_catalog",
            Self::GetProductInfo => "get_product_info",
        }
    }

    const fn failure_message(self) -> &'static str {
        match self {
            Self::SearchProducts => "Sorry, something went wrong while searching. Please try again.",
            Self::AddToCart => {
                "Sorry, something went wrong while adding the item to your cart. Please try again."
            }
            Self::GetCartInfo => {
                "Sorry, something went wrong while loading your cart. Please try again."
            }
            Self::BrowseCatalog => {
                "Sorry, something went wrong while loading the catalog. Please try again."
            }
            Self::GetProductInfo => "Sorry, I couldn't get the product information.",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| DispatchError::FunctionNotFound(s.to_string()))
    }
}

/// Errors raised before any handler runs.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("function not found: {0}")]
    FunctionNotFound(String),
}

impl DispatchError {
    /// The envelope reported to the orchestrator for this error.
    #[must_use]
    pub fn to_envelope(&self) -> FunctionResponse {
        match self {
            Self::FunctionNotFound(name) => FunctionResponse::failure(
                ErrorCode::FunctionNotFound,
                format!("Function \"{name}\" is not available."),
            )
            .with_value("function", Value::String(name.clone())),
        }
    }
}

/// Why a handler did not produce a successful envelope.
#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    /// Expected failure reported to the caller as is.
    #[error("{code}: {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HandlerError {
    fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

/// Routes function calls to their handlers.
#[derive(Clone)]
pub struct FunctionDispatcher {
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
    search: SearchEngine,
}

impl FunctionDispatcher {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        search: SearchEngine,
    ) -> Self {
        Self {
            catalog,
            carts,
            search,
        }
    }

    /// Execute a `{operation, arguments}` call.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::FunctionNotFound` for an unknown operation.
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<FunctionResponse, DispatchError> {
        self.execute(&call.operation, &call.arguments).await
    }

    /// Execute a function by name.
    ///
    /// Handler failures never surface as `Err`: they are folded into a failed
    /// envelope so the assistant always has something to say.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::FunctionNotFound` for an unknown name.
    #[instrument(skip(self, args), fields(function = %name))]
    pub async fn execute(&self, name: &str, args: &Value) -> Result<FunctionResponse, DispatchError> {
        let operation: Operation = name.parse()?;
        let hostname = args::hostname(args);

        let result = match operation {
            Operation::SearchProducts => self.search_products(&hostname, args).await,
            Operation::AddToCart => self.add_to_cart(&hostname, args).await,
            Operation::GetCartInfo => self.get_cart_info(&hostname, args).await,
            Operation::BrowseCatalog => self.browse_catalog(&hostname).await,
            Operation::GetProductInfo => self.get_product_info(&hostname, args).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(HandlerError::Rejected { code, message }) => {
                info!(%code, %hostname, "Function call rejected");
                FunctionResponse::failure(code, message)
                    .with_value("hostname", Value::String(hostname))
            }
            Err(e) => {
                error!(error = %e, %hostname, "Function call failed");
                FunctionResponse::failure(ErrorCode::InternalError, operation.failure_message())
                    .with_value("hostname", Value::String(hostname))
            }
        };
        Ok(response)
    }

    fn currency(&self) -> CurrencyCode {
        self.search.currency()
    }

    /// Resolve the shop a call is scoped to.
    async fn domain(&self, hostname: &str) -> Result<Domain, HandlerError> {
        self.catalog
            .find_domain_by_hostname(hostname)
            .await?
            .ok_or_else(|| {
                HandlerError::rejected(ErrorCode::DomainNotFound, "This shop could not be found.")
            })
    }

    /// Resolve the acting shopper.
    ///
    /// `requested` is the parsed `userId` argument; a malformed id counts as
    /// an unknown user.
    async fn user(
        &self,
        requested: Result<Option<UserId>, args::InvalidArgument>,
    ) -> Result<UserId, HandlerError> {
        let not_found = || {
            HandlerError::rejected(
                ErrorCode::UserNotFound,
                "Shopper not found. Please sign in first.",
            )
        };
        let requested = requested.map_err(|_| not_found())?;
        self.carts
            .resolve_user(requested)
            .await?
            .ok_or_else(not_found)
    }
}

/// Display name of a variant: product title plus variant title, unless the
/// variant is the placeholder default.
#[must_use]
pub fn item_label(product_title: &str, variant_title: &str) -> String {
    let variant_title = variant_title.trim();
    if variant_title.is_empty() || variant_title == DEFAULT_VARIANT_TITLE {
        product_title.trim().to_string()
    } else {
        format!("{} {variant_title}", product_title.trim())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::dispatcher_with_store;

    #[test]
    fn test_operation_names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert!(matches!(
            "checkout".parse::<Operation>(),
            Err(DispatchError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn test_item_label() {
        assert_eq!(item_label("Mug", "Default Title"), "Mug");
        assert_eq!(item_label("Mug", "Red"), "Mug Red");
        assert_eq!(item_label("Mug", ""), "Mug");
    }

    #[test]
    fn test_function_not_found_envelope() {
        let envelope = DispatchError::FunctionNotFound("checkout".into()).to_envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.error, Some(ErrorCode::FunctionNotFound));
        assert!(!envelope.response.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_function_is_dispatch_error() {
        let (dispatcher, _store) = dispatcher_with_store(vec![1.0, 0.0]);
        let call = FunctionCall {
            operation: "delete_everything".into(),
            arguments: json!({}),
        };
        assert!(matches!(
            dispatcher.dispatch(&call).await,
            Err(DispatchError::FunctionNotFound(name)) if name == "delete_everything"
        ));
    }

    #[tokio::test]
    async fn test_unknown_domain_reports_hostname() {
        let (dispatcher, _store) = dispatcher_with_store(vec![1.0, 0.0]);
        let response = dispatcher
            .execute("browse_catalog", &json!({"hostname": "nowhere.test"}))
            .await
            .unwrap();
        assert_eq!(response.error, Some(ErrorCode::DomainNotFound));
        assert_eq!(response.get("hostname"), Some(&json!("nowhere.test")));
    }

    #[test]
    fn test_function_call_arguments_default() {
        let call: FunctionCall = serde_json::from_value(json!({"operation": "get_cart_info"})).unwrap();
        assert_eq!(call.arguments, Value::Null);
    }
}
