//! The uniform response envelope returned by every function.
//!
//! ```json
//! {"success": true, "response": "...", "products": [...]}
//! {"success": false, "response": "...", "error": "DOMAIN_NOT_FOUND", "hostname": "shop.test"}
//! ```
//!
//! `response` is always a non-empty, human-readable sentence the assistant
//! can speak as is. Operation payloads are flattened next to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DomainNotFound,
    ProductNotFound,
    VariantNotFound,
    UserNotFound,
    InvalidVariantId,
    InvalidQuantity,
    InvalidProductId,
    InvalidQuery,
    NoVariantsAvailable,
    FunctionNotFound,
    SearchUnavailable,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DomainNotFound => "DOMAIN_NOT_FOUND",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::VariantNotFound => "VARIANT_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidVariantId => "INVALID_VARIANT_ID",
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InvalidProductId => "INVALID_PRODUCT_ID",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::NoVariantsAvailable => "NO_VARIANTS_AVAILABLE",
            Self::FunctionNotFound => "FUNCTION_NOT_FOUND",
            Self::SearchUnavailable => "SEARCH_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope returned by every function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub success: bool,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// Operation-specific fields (`products`, `cart`, `catalog`, ...).
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl FunctionResponse {
    /// A successful result.
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
            error: None,
            payload: Map::new(),
        }
    }

    /// A failed result with a machine-readable code.
    pub fn failure(code: ErrorCode, response: impl Into<String>) -> Self {
        Self {
            success: false,
            response: response.into(),
            error: Some(code),
            payload: Map::new(),
        }
    }

    /// Attach a payload field.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn with<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self, serde_json::Error> {
        self.payload
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Attach an already-built JSON value.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Payload field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::NoVariantsAvailable).unwrap();
        assert_eq!(json, "\"NO_VARIANTS_AVAILABLE\"");
        assert_eq!(ErrorCode::FunctionNotFound.to_string(), "FUNCTION_NOT_FOUND");
    }

    #[test]
    fn test_payload_is_flattened() {
        let envelope = FunctionResponse::ok("Found 1 product")
            .with("products", &vec![json!({"id": 1})])
            .unwrap();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "response": "Found 1 product", "products": [{"id": 1}]})
        );
    }

    #[test]
    fn test_failure_carries_code() {
        let envelope = FunctionResponse::failure(ErrorCode::DomainNotFound, "Shop not found.")
            .with_value("hostname", json!("nowhere.test"));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "DOMAIN_NOT_FOUND");
        assert_eq!(value["hostname"], "nowhere.test");

        let back: FunctionResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }
}
