//! Natural-language answers for ranked search results.
//!
//! Everything here is a pure function of its inputs; identical rankings
//! always produce identical text.

use std::fmt::Write as _;

use shopvox_core::{CurrencyCode, Price};

use super::{Ranking, SearchCandidate};

/// Answer for a query that matched nothing.
#[must_use]
pub fn not_found_message(query: &str) -> String {
    format!(
        "Sorry, I couldn't find any products matching \"{}\". Try rephrasing or naming the product more precisely.",
        query.trim()
    )
}

/// Answer for a shop that has no active products.
#[must_use]
pub fn empty_catalog_message() -> String {
    "The catalog is empty right now. Please check back later.".to_string()
}

/// Answer when the query could not be embedded.
#[must_use]
pub fn search_unavailable_message() -> String {
    "Sorry, product search is temporarily unavailable. Please try again in a moment.".to_string()
}

/// Build the answer for a ranking.
#[must_use]
pub fn compose_response(ranking: &Ranking, query: &str, currency: CurrencyCode) -> String {
    match ranking.groups.as_slice() {
        [] => not_found_message(query),
        [group] => match group.members.as_slice() {
            [] => not_found_message(query),
            [single] => single_item(single, currency),
            members => {
                let mut out = format!("Found \"{}\" in several variants:", group.product_title);
                for (i, member) in members.iter().enumerate() {
                    let _ = write!(out, "\n{}. {}", i + 1, member.title);
                    push_price_and_sku(&mut out, member, currency);
                }
                out
            }
        },
        groups => {
            let mut out = format!("Found several products matching \"{}\":", query.trim());
            for (i, group) in groups.iter().enumerate() {
                let _ = write!(out, "\n{}. {}", i + 1, group.product_title);
                if let Some(best) = group.representative() {
                    push_price_and_sku(&mut out, best, currency);
                }
                let variants = group.variant_count();
                if variants > 1 {
                    let _ = write!(out, " ({variants} variants)");
                }
            }
            out
        }
    }
}

fn single_item(candidate: &SearchCandidate, currency: CurrencyCode) -> String {
    let mut out = match candidate.price {
        Some(minor) => format!(
            "{} costs {}",
            candidate.title,
            Price::from_minor_units(minor, currency)
        ),
        None => format!("Found {}", candidate.title),
    };
    if let Some(sku) = &candidate.sku {
        let _ = write!(out, " (SKU: {sku})");
    }
    out.push('.');
    out
}

fn push_price_and_sku(out: &mut String, candidate: &SearchCandidate, currency: CurrencyCode) {
    if let Some(minor) = candidate.price {
        let _ = write!(out, " - {}", Price::from_minor_units(minor, currency));
    }
    if let Some(sku) = &candidate.sku {
        let _ = write!(out, " ({sku})");
    }
}
