//! Retrieval candidates as returned to the calling assistant.

use serde::{Deserialize, Serialize};

use shopvox_core::{EntityKind, ProductId};

use crate::store::{NearestEntity, NearestNeighbor};

/// One retrieved product or variant with its normalized similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCandidate {
    pub id: i32,
    /// Product title, or `"<product title> <variant title>"` for variants.
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// `1 - cosine distance`, clamped to `[0, 1]`.
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_product_id: Option<ProductId>,
    /// Title of the product this candidate belongs to.
    pub product_title: String,
}

impl SearchCandidate {
    /// Product id this candidate is grouped under.
    #[must_use]
    pub fn group_key(&self) -> ProductId {
        self.parent_product_id
            .unwrap_or_else(|| ProductId::new(self.id))
    }

    /// Whether this candidate is a purchasable variant.
    #[must_use]
    pub fn is_variant(&self) -> bool {
        self.kind == EntityKind::Variant
    }
}

impl From<NearestNeighbor> for SearchCandidate {
    fn from(row: NearestNeighbor) -> Self {
        let similarity = similarity_from_distance(row.distance);
        match row.entity {
            NearestEntity::Product { id, title } => Self {
                id: id.as_i32(),
                product_title: title.clone(),
                title,
                kind: EntityKind::Product,
                similarity,
                price: None,
                sku: None,
                parent_product_id: None,
            },
            NearestEntity::Variant {
                id,
                title,
                price,
                sku,
                product_id,
                product_title,
            } => Self {
                id: id.as_i32(),
                title: format!("{product_title} {title}").trim().to_string(),
                kind: EntityKind::Variant,
                similarity,
                price: Some(price),
                sku,
                parent_product_id: Some(product_id),
                product_title,
            },
        }
    }
}

/// Map a cosine distance to a similarity in `[0, 1]`.
///
/// Non-finite distances map to zero.
#[must_use]
pub fn similarity_from_distance(distance: f64) -> f64 {
    let similarity = 1.0 - distance;
    if similarity.is_finite() {
        similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
