//! Identity deduplication within one marketplace's page.
//!
//! A product's identity is `(marketplace, external_id)`. Some backends
//! repeat a listing across promoted and organic slots; only the first
//! occurrence is kept so its relevance rank is preserved. Listings from
//! different marketplaces are never merged.

use std::collections::HashSet;

use crate::types::ProductResult;

/// Remove repeated identities, keeping the first occurrence and the
/// original order.
pub fn dedupe_by_identity(products: Vec<ProductResult>) -> Vec<ProductResult> {
    let before = products.len();
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(before);
    let kept: Vec<ProductResult> = products
        .into_iter()
        .filter(|p| seen.insert((p.marketplace.to_string(), p.external_id.clone())))
        .collect();
    if kept.len() < before {
        tracing::debug!(removed = before - kept.len(), "dropped duplicate listings");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketplaceId, Money};
    use rust_decimal_macros::dec;

    fn product(market: &str, id: &str, title: &str) -> ProductResult {
        ProductResult::new(
            MarketplaceId::parse(market).expect("valid"),
            id,
            title,
            Money::usd(dec!(1)),
            format!("https://example.com/{id}"),
        )
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(dedupe_by_identity(vec![]).is_empty());
    }

    #[test]
    fn first_occurrence_wins() {
        let out = dedupe_by_identity(vec![
            product("MLC", "1", "promoted"),
            product("MLC", "2", "other"),
            product("MLC", "1", "organic"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "promoted");
        assert_eq!(out[1].external_id, "2");
    }

    #[test]
    fn same_id_on_different_marketplaces_kept() {
        let out = dedupe_by_identity(vec![product("MLC", "1", "a"), product("MLA", "1", "a")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn matching_titles_not_merged() {
        let out = dedupe_by_identity(vec![
            product("MLC", "1", "iPhone 15"),
            product("MLC", "2", "iPhone 15"),
        ]);
        assert_eq!(out.len(), 2);
    }
}
