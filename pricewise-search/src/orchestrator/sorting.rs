//! Deterministic ordering of the merged result pool.
//!
//! Every strategy is a total order: after its own key it falls back to
//! marketplace id, external id and finally the marketplace's requested
//! position, so completion order of the fan-out can never affect output.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::tax::TaxBreakdown;
use crate::types::{ProductResult, SortStrategy};

/// A product in the merged pool, with everything ranking needs.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub product: ProductResult,
    pub tax: Option<TaxBreakdown>,
    /// Comparable cost in USD.
    pub cost: Decimal,
    /// Position of the product's marketplace in the request.
    pub position: usize,
    /// Index of the product within its marketplace's page.
    pub rank: usize,
}

/// Sort `pool` in place by `strategy`.
pub(crate) fn sort_candidates(pool: &mut [Candidate], strategy: SortStrategy) {
    pool.sort_by(|a, b| compare(a, b, strategy));
}

fn compare(a: &Candidate, b: &Candidate, strategy: SortStrategy) -> Ordering {
    let primary = match strategy {
        SortStrategy::Relevance => relevance(a, b),
        SortStrategy::PriceAsc => a.cost.cmp(&b.cost),
        SortStrategy::PriceDesc => b.cost.cmp(&a.cost),
        SortStrategy::Newest => {
            descending_present_first(a.product.listed_at, b.product.listed_at, Ord::cmp)
                .then_with(|| relevance(a, b))
        }
        SortStrategy::BestSeller => descending_present_first(
            a.product.seller_rating,
            b.product.seller_rating,
            f64::total_cmp,
        )
        .then_with(|| a.cost.cmp(&b.cost)),
    };
    primary.then_with(|| identity(a, b))
}

/// Round-robin interleave: every marketplace's first item, then every
/// second item, and so on, in requested order. Exhausted marketplaces
/// simply stop contributing.
fn relevance(a: &Candidate, b: &Candidate) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| a.position.cmp(&b.position))
}

fn identity(a: &Candidate, b: &Candidate) -> Ordering {
    a.product
        .marketplace
        .cmp(&b.product.marketplace)
        .then_with(|| a.product.external_id.cmp(&b.product.external_id))
        .then_with(|| a.position.cmp(&b.position))
        .then_with(|| a.rank.cmp(&b.rank))
}

/// Larger values first; missing values after every present one.
fn descending_present_first<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(&b, &a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Price rank of every item in `page`, index-aligned: 1 for the lowest
/// cost, ties by marketplace id then external id. Rank 1 is the best price.
pub(crate) fn price_ranks(page: &[Candidate]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..page.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&page[a], &page[b]);
        a.cost.cmp(&b.cost).then_with(|| identity(a, b))
    });
    let mut ranks = vec![0; page.len()];
    for (rank, index) in (1u32..).zip(order) {
        ranks[index] = rank;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketplaceId, Money};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candidate(market: &str, id: &str, cost: Decimal, position: usize, rank: usize) -> Candidate {
        let marketplace = MarketplaceId::parse(market).expect("valid");
        Candidate {
            product: ProductResult::new(marketplace, id, id, Money::usd(cost), "https://x"),
            tax: None,
            cost,
            position,
            rank,
        }
    }

    fn ids(pool: &[Candidate]) -> Vec<&str> {
        pool.iter().map(|c| c.product.external_id.as_str()).collect()
    }

    #[test]
    fn relevance_interleaves_in_requested_order() {
        let mut pool = vec![
            candidate("A", "a1", dec!(1), 0, 0),
            candidate("A", "a2", dec!(1), 0, 1),
            candidate("A", "a3", dec!(1), 0, 2),
            candidate("B", "b1", dec!(1), 1, 0),
            candidate("B", "b2", dec!(1), 1, 1),
        ];
        pool.reverse();
        sort_candidates(&mut pool, SortStrategy::Relevance);
        assert_eq!(ids(&pool), vec!["a1", "b1", "a2", "b2", "a3"]);
    }

    #[test]
    fn relevance_follows_request_not_id_order() {
        let mut pool = vec![
            candidate("A", "a1", dec!(1), 1, 0),
            candidate("Z", "z1", dec!(1), 0, 0),
        ];
        sort_candidates(&mut pool, SortStrategy::Relevance);
        assert_eq!(ids(&pool), vec!["z1", "a1"]);
    }

    #[test]
    fn price_ties_break_ascending_both_directions() {
        let base = vec![
            candidate("B", "x", dec!(10), 0, 0),
            candidate("A", "y", dec!(10), 1, 0),
            candidate("A", "b", dec!(10), 1, 1),
            candidate("C", "z", dec!(5), 2, 0),
        ];
        let mut asc = base.clone();
        sort_candidates(&mut asc, SortStrategy::PriceAsc);
        assert_eq!(ids(&asc), vec!["z", "b", "y", "x"]);

        let mut desc = base;
        sort_candidates(&mut desc, SortStrategy::PriceDesc);
        assert_eq!(ids(&desc), vec!["b", "y", "x", "z"]);
    }

    #[test]
    fn newest_puts_missing_timestamps_last_in_relevance_order() {
        let mut old = candidate("A", "old", dec!(1), 0, 0);
        old.product.listed_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut new = candidate("B", "new", dec!(1), 1, 1);
        new.product.listed_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let none_late = candidate("A", "none_late", dec!(1), 0, 1);
        let none_early = candidate("B", "none_early", dec!(1), 1, 0);

        let mut pool = vec![none_late, old, none_early, new];
        sort_candidates(&mut pool, SortStrategy::Newest);
        assert_eq!(ids(&pool), vec!["new", "old", "none_early", "none_late"]);
    }

    #[test]
    fn best_seller_ranks_by_rating_then_cost() {
        let mut top = candidate("A", "top", dec!(50), 0, 0);
        top.product.seller_rating = Some(4.9);
        let mut cheap_mid = candidate("B", "cheap_mid", dec!(10), 1, 0);
        cheap_mid.product.seller_rating = Some(4.0);
        let mut dear_mid = candidate("A", "dear_mid", dec!(20), 0, 1);
        dear_mid.product.seller_rating = Some(4.0);
        let unrated = candidate("B", "unrated", dec!(1), 1, 1);

        let mut pool = vec![unrated, dear_mid, cheap_mid, top];
        sort_candidates(&mut pool, SortStrategy::BestSeller);
        assert_eq!(ids(&pool), vec!["top", "cheap_mid", "dear_mid", "unrated"]);
    }

    #[test]
    fn sort_is_independent_of_input_order() {
        let pool = vec![
            candidate("A", "1", dec!(3), 0, 0),
            candidate("B", "2", dec!(3), 1, 0),
            candidate("A", "3", dec!(1), 0, 1),
            candidate("B", "4", dec!(2), 1, 1),
        ];
        for strategy in SortStrategy::all() {
            let mut forward = pool.clone();
            let mut backward: Vec<_> = pool.iter().rev().cloned().collect();
            sort_candidates(&mut forward, *strategy);
            sort_candidates(&mut backward, *strategy);
            assert_eq!(ids(&forward), ids(&backward), "{strategy}");
        }
    }

    #[test]
    fn best_price_prefers_lowest_cost_then_identity() {
        let page = vec![
            candidate("B", "b", dec!(5), 0, 0),
            candidate("A", "z", dec!(5), 1, 0),
            candidate("A", "a", dec!(7), 1, 1),
        ];
        assert_eq!(price_ranks(&page), vec![2, 1, 3]);
        assert!(price_ranks(&[]).is_empty());
    }

    #[test]
    fn price_ranks_ignore_display_order() {
        let mut page = vec![
            candidate("MLC", "c", dec!(30), 0, 0),
            candidate("MLA", "a", dec!(10), 1, 0),
            candidate("MLC", "d", dec!(40), 0, 1),
            candidate("MLA", "b", dec!(20), 1, 1),
        ];
        sort_candidates(&mut page, SortStrategy::Relevance);
        let ranked: Vec<(&str, u32)> = ids(&page)
            .into_iter()
            .zip(price_ranks(&page))
            .collect();
        assert_eq!(ranked, vec![("c", 3), ("a", 1), ("d", 4), ("b", 2)]);
    }
}
