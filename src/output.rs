//! JSON rendering for CLI output.

use pricewise_search::AggregatedResult;
use serde::Serialize;

use crate::error::{PricewiseError, Result};

/// Serialize `value` as compact or pretty JSON.
///
/// # Errors
///
/// Returns [`PricewiseError::Output`] if `value` cannot be serialized.
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.map_err(|e| PricewiseError::Output(e.to_string()))
}

/// Render a search result with every amount rounded to cents.
///
/// # Errors
///
/// Returns [`PricewiseError::Output`] if the result cannot be serialized.
pub fn search_json(result: &AggregatedResult, pretty: bool) -> Result<String> {
    to_json(&result.rounded(), pretty)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::collections::BTreeMap;

    use pricewise_search::{
        CountryCode, MarketplaceId, Money, ProductResult, RankedProduct, SortStrategy,
        TaxCalculator,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn chile_import(price: Decimal) -> AggregatedResult {
        let marketplace = MarketplaceId::parse("EBAY_US").expect("id");
        let amount = Money::usd(price);
        let tax = TaxCalculator::default()
            .calculate(
                &amount,
                None,
                &CountryCode::parse("US").expect("cc"),
                &CountryCode::parse("CL").expect("cc"),
            )
            .expect("chile profile");
        let total_cost = tax.total();
        AggregatedResult {
            query: "lamp".into(),
            items: vec![RankedProduct {
                product: ProductResult::new(
                    marketplace.clone(),
                    "1",
                    "Lamp",
                    amount,
                    "https://www.ebay.com/itm/1",
                ),
                tax: Some(tax),
                total_cost,
                best_price: true,
                price_rank: 1,
            }],
            total_count: 1,
            has_more: false,
            sort: SortStrategy::PriceAsc,
            succeeded: vec![marketplace],
            failures: BTreeMap::new(),
        }
    }

    #[test]
    fn search_output_is_rounded_to_cents() {
        let result = chile_import(Decimal::new(10001, 2));
        // Full precision is kept on the result itself.
        let tax = result.items[0].tax.as_ref().expect("tax");
        assert_eq!(tax.vat, Decimal::new(20_142_014, 6));

        let json = search_json(&result, false).expect("render");
        assert!(json.contains(r#""customs_duty":"6.00""#), "{json}");
        assert!(json.contains(r#""vat":"20.14""#), "{json}");
        assert!(json.contains(r#""total_with_taxes":"126.15""#), "{json}");
        assert!(!json.contains("126.152614"), "{json}");

        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["items"][0]["total_cost"]["amount"], "126.15");
        assert_eq!(value["items"][0]["price_rank"], 1);
        assert_eq!(value["items"][0]["product"]["price"]["amount"], "100.01");
    }

    #[test]
    fn pretty_output_spans_lines() {
        let result = chile_import(Decimal::new(50, 0));
        let pretty = search_json(&result, true).expect("render");
        assert!(pretty.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&pretty).expect("json"),
            serde_json::from_str::<serde_json::Value>(&search_json(&result, false).expect("render"))
                .expect("json"),
        );
    }
}
