//! Function definitions advertised to the conversational orchestrator.
//!
//! Each definition carries a JSON Schema for its arguments. The schemas are
//! descriptive; handlers still validate every argument themselves.

use serde::Serialize;
use serde_json::json;

use super::Operation;

/// A callable function as presented to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema for the function's arguments.
    pub parameters: serde_json::Value,
}

/// All functions, in the order they are advertised.
#[must_use]
pub fn all_functions() -> Vec<FunctionDefinition> {
    Operation::ALL.iter().map(|op| definition(*op)).collect()
}

/// Look up a function definition by name.
#[must_use]
pub fn get_function_by_name(name: &str) -> Option<FunctionDefinition> {
    name.parse::<Operation>().ok().map(definition)
}

fn hostname_schema() -> serde_json::Value {
    json!({
        "type": "string",
        "description": "Shop hostname the conversation belongs to (default: localhost)"
    })
}

fn definition(operation: Operation) -> FunctionDefinition {
    match operation {
        Operation::SearchProducts => FunctionDefinition {
            name: operation.name(),
            description: "Search the catalog for products matching what the user asked for. \
                Use whenever the user names or describes a product, asks about price or \
                availability of something specific, or wants to find an item.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What the user is looking for, in their own words"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (1-20, default 5)",
                        "minimum": 1,
                        "maximum": 20
                    },
                    "hostname": hostname_schema()
                },
                "required": ["query"]
            }),
        },
        Operation::AddToCart => FunctionDefinition {
            name: operation.name(),
            description: "Add a product variant to the shopping cart. Use when the user wants \
                to buy something or add it to the cart. The variant id comes from a previous \
                search result.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "variantId": {
                        "type": ["integer", "string"],
                        "description": "Id of the variant to add"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "How many to add (default 1)",
                        "minimum": 1
                    },
                    "userId": {
                        "type": ["integer", "string"],
                        "description": "Shopper id (defaults to the current shopper)"
                    },
                    "hostname": hostname_schema()
                },
                "required": ["variantId"]
            }),
        },
        Operation::GetCartInfo => FunctionDefinition {
            name: operation.name(),
            description: "Show the shopping cart contents and total. Use when the user asks \
                what is in the cart or how much it costs.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "userId": {
                        "type": ["integer", "string"],
                        "description": "Shopper id (defaults to the current shopper)"
                    },
                    "hostname": hostname_schema()
                },
                "required": []
            }),
        },
        Operation::BrowseCatalog => FunctionDefinition {
            name: operation.name(),
            description: "Give an overview of the catalog. Use for general questions like \
                \"what do you have?\" or \"show me your products\".",
            parameters: json!({
                "type": "object",
                "properties": {
                    "hostname": hostname_schema()
                },
                "required": []
            }),
        },
        Operation::GetProductInfo => FunctionDefinition {
            name: operation.name(),
            description: "Get the price and details of one product by id, optionally for a \
                specific variant.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "productId": {
                        "type": ["integer", "string"],
                        "description": "Product id"
                    },
                    "variantId": {
                        "type": ["integer", "string"],
                        "description": "Variant id (defaults to the first variant)"
                    },
                    "hostname": hostname_schema()
                },
                "required": ["productId"]
            }),
        },
    }
}
