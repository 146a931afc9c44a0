//! Core types: identifiers, money, product results, and aggregated output.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::country;
use crate::error::{MarketplaceError, OrchestratorError};
use crate::tax::TaxBreakdown;

/// Maximum length of a marketplace identifier.
const MAX_MARKETPLACE_ID_LEN: usize = 32;

/// Identifier of a marketplace backend, e.g. `MLC` or `EBAY_US`.
///
/// Always upper-case ASCII letters, digits and underscores. Ordering is
/// lexical and is used as the deterministic tie-break between marketplaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketplaceId(String);

impl MarketplaceId {
    /// Parse and normalise a marketplace identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidRequest`] if the identifier is
    /// empty, too long, or contains characters other than ASCII letters,
    /// digits and underscores.
    pub fn parse(raw: &str) -> Result<Self, OrchestratorError> {
        let normalised = raw.trim().to_ascii_uppercase();
        if normalised.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "marketplace id must not be empty".into(),
            ));
        }
        if normalised.len() > MAX_MARKETPLACE_ID_LEN {
            return Err(OrchestratorError::InvalidRequest(format!(
                "marketplace id longer than {MAX_MARKETPLACE_ID_LEN} characters"
            )));
        }
        if !normalised
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(OrchestratorError::InvalidRequest(format!(
                "marketplace id {normalised:?} contains invalid characters"
            )));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MarketplaceId {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MarketplaceId {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MarketplaceId> for String {
    fn from(id: MarketplaceId) -> Self {
        id.0
    }
}

/// An assigned ISO 3166-1 alpha-2 country code, upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse a country code, accepting any case.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidRequest`] if the code is not an
    /// assigned ISO 3166-1 alpha-2 code.
    pub fn parse(raw: &str) -> Result<Self, OrchestratorError> {
        let normalised = raw.trim().to_ascii_uppercase();
        if !country::is_assigned(&normalised) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "unknown country code {normalised:?}"
            )));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CountryCode {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

/// An ISO 4217-shaped currency code (three ASCII letters, upper-case).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a currency code, accepting any case.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidRequest`] unless the input is
    /// exactly three ASCII letters.
    pub fn parse(raw: &str) -> Result<Self, OrchestratorError> {
        let normalised = raw.trim().to_ascii_uppercase();
        if normalised.len() != 3 || !normalised.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "invalid currency code {normalised:?}"
            )));
        }
        Ok(Self(normalised))
    }

    /// US dollars, the reference currency for tax and cost comparison.
    pub fn usd() -> Self {
        Self("USD".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A monetary amount in a specific currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// An amount in US dollars.
    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::usd())
    }

    /// Amount rounded to two decimal places for display.
    pub fn rounded(&self) -> Self {
        Self::new(round_display(self.amount), self.currency.clone())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", round_display(self.amount), self.currency)
    }
}

/// Round an amount to two decimal places, half away from zero.
pub(crate) fn round_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Condition of a listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
    Refurbished,
    #[default]
    Unknown,
}

/// A single product listing returned by a marketplace.
///
/// Identity is `(marketplace, external_id)`. Listings from different
/// marketplaces are never merged, even when titles match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    /// Marketplace that listed the product.
    pub marketplace: MarketplaceId,
    /// Product identifier within that marketplace.
    pub external_id: String,
    pub title: String,
    pub price: Money,
    /// Estimated shipping cost, when the marketplace reports one.
    pub shipping: Option<Money>,
    pub url: String,
    pub image_url: Option<String>,
    /// Seller rating on a 0–5 scale.
    pub seller_rating: Option<f64>,
    pub seller_name: Option<String>,
    pub listed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub condition: Condition,
    pub available_quantity: Option<u32>,
}

impl ProductResult {
    /// Create a listing with only the mandatory fields set.
    pub fn new(
        marketplace: MarketplaceId,
        external_id: impl Into<String>,
        title: impl Into<String>,
        price: Money,
        url: impl Into<String>,
    ) -> Self {
        Self {
            marketplace,
            external_id: external_id.into(),
            title: title.into(),
            price,
            shipping: None,
            url: url.into(),
            image_url: None,
            seller_rating: None,
            seller_name: None,
            listed_at: None,
            condition: Condition::Unknown,
            available_quantity: None,
        }
    }

    pub fn with_shipping(mut self, shipping: Money) -> Self {
        self.shipping = Some(shipping);
        self
    }

    /// Set the seller rating, clamped to the 0–5 scale. Non-finite values
    /// are treated as unknown.
    pub fn with_seller_rating(mut self, rating: f64) -> Self {
        self.seller_rating = rating.is_finite().then(|| rating.clamp(0.0, 5.0));
        self
    }

    pub fn with_listed_at(mut self, listed_at: DateTime<Utc>) -> Self {
        self.listed_at = Some(listed_at);
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Whether the listing ships for free.
    pub fn has_free_shipping(&self) -> bool {
        self.shipping.as_ref().is_some_and(|s| s.amount.is_zero())
    }
}

/// One page of results from a single marketplace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub products: Vec<ProductResult>,
    /// Total matches the marketplace reports, across all pages.
    pub total_count: u64,
    /// Whether the marketplace has further pages.
    pub has_more: bool,
}

/// How the merged result list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Round-robin across marketplaces in requested order.
    #[default]
    Relevance,
    /// Cheapest total cost first.
    PriceAsc,
    /// Most expensive total cost first.
    PriceDesc,
    /// Most recently listed first.
    Newest,
    /// Best seller rating first.
    BestSeller,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Newest => "newest",
            Self::BestSeller => "best_seller",
        }
    }

    pub fn all() -> &'static [SortStrategy] {
        &[
            Self::Relevance,
            Self::PriceAsc,
            Self::PriceDesc,
            Self::Newest,
            Self::BestSeller,
        ]
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortStrategy {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| {
                OrchestratorError::InvalidRequest(format!("unknown sort strategy {s:?}"))
            })
    }
}

/// A product placed in the merged result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    pub product: ProductResult,
    /// Import tax estimate. `None` when no destination was requested or
    /// the estimate could not be computed; never defaulted to zero.
    pub tax: Option<TaxBreakdown>,
    /// Comparable total cost in the reference currency: tax-inclusive when
    /// tax was computed, otherwise price plus shipping.
    pub total_cost: Money,
    /// Set on exactly one item per non-empty page.
    pub best_price: bool,
    /// Position of this item when the page is ordered by total cost,
    /// 1 being the cheapest.
    pub price_rank: u32,
}

impl RankedProduct {
    /// Copy with the tax breakdown and total cost rounded to cents.
    pub fn rounded(&self) -> Self {
        Self {
            tax: self.tax.as_ref().map(TaxBreakdown::rounded),
            total_cost: self.total_cost.rounded(),
            ..self.clone()
        }
    }
}

/// Merged outcome of a multi-marketplace search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Query text as searched, trimmed. Case is preserved.
    pub query: String,
    /// Ordered page of results.
    pub items: Vec<RankedProduct>,
    /// Sum of the totals reported by succeeding marketplaces.
    pub total_count: u64,
    pub has_more: bool,
    /// Strategy actually applied.
    pub sort: SortStrategy,
    /// Marketplaces that answered, in requested order.
    pub succeeded: Vec<MarketplaceId>,
    /// Every marketplace that failed, with the reason.
    pub failures: BTreeMap<MarketplaceId, MarketplaceError>,
}

impl AggregatedResult {
    /// Copy with every item's monetary figures rounded for display.
    ///
    /// Ranking is computed at full precision; rounding only changes how
    /// amounts are presented.
    pub fn rounded(&self) -> Self {
        Self {
            items: self.items.iter().map(RankedProduct::rounded).collect(),
            ..self.clone()
        }
    }

    /// The item flagged as best price, if the page is non-empty.
    pub fn best_price(&self) -> Option<&RankedProduct> {
        self.items.iter().find(|item| item.best_price)
    }

    /// Whether at least one marketplace failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failed_marketplaces(&self) -> Vec<&MarketplaceId> {
        self.failures.keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn marketplace_id_normalises_case_and_whitespace() {
        let id = MarketplaceId::parse("  ebay_us ").expect("valid");
        assert_eq!(id.as_str(), "EBAY_US");
    }

    #[test]
    fn marketplace_id_rejects_bad_input() {
        assert!(MarketplaceId::parse("").is_err());
        assert!(MarketplaceId::parse("has space").is_err());
        assert!(MarketplaceId::parse("dash-ed").is_err());
        assert!(MarketplaceId::parse(&"X".repeat(33)).is_err());
    }

    #[test]
    fn marketplace_id_orders_lexically() {
        let a = MarketplaceId::parse("EBAY_US").expect("valid");
        let b = MarketplaceId::parse("MLC").expect("valid");
        assert!(a < b);
    }

    #[test]
    fn marketplace_id_deserialize_validates() {
        let ok: MarketplaceId = serde_json::from_str("\"mlc\"").expect("deserialize");
        assert_eq!(ok.as_str(), "MLC");
        let bad: Result<MarketplaceId, _> = serde_json::from_str("\"no way\"");
        assert!(bad.is_err());
    }

    #[test]
    fn country_code_accepts_lowercase() {
        assert_eq!(CountryCode::parse("cl").expect("valid").as_str(), "CL");
    }

    #[test]
    fn country_code_rejects_unassigned() {
        let err = CountryCode::parse("XX").unwrap_err();
        assert!(err.to_string().contains("unknown country code"));
    }

    #[test]
    fn currency_code_requires_three_letters() {
        assert!(CurrencyCode::parse("clp").is_ok());
        assert!(CurrencyCode::parse("US").is_err());
        assert!(CurrencyCode::parse("U5D").is_err());
    }

    #[test]
    fn money_display_rounds_to_cents() {
        let money = Money::usd(dec!(23.945));
        assert_eq!(money.to_string(), "23.95 USD");
        assert_eq!(money.amount, dec!(23.945));
    }

    #[test]
    fn seller_rating_is_clamped() {
        let id = MarketplaceId::parse("MLC").expect("valid");
        let p = ProductResult::new(id, "1", "t", Money::usd(dec!(1)), "u");
        assert_eq!(p.clone().with_seller_rating(7.5).seller_rating, Some(5.0));
        assert_eq!(p.clone().with_seller_rating(-1.0).seller_rating, Some(0.0));
        assert_eq!(p.with_seller_rating(f64::NAN).seller_rating, None);
    }

    #[test]
    fn free_shipping_detected_from_zero_cost() {
        let id = MarketplaceId::parse("MLC").expect("valid");
        let p = ProductResult::new(id, "1", "t", Money::usd(dec!(10)), "u");
        assert!(!p.has_free_shipping());
        assert!(p.with_shipping(Money::usd(dec!(0))).has_free_shipping());
    }

    #[test]
    fn sort_strategy_parses_both_spellings() {
        assert_eq!(
            "price-asc".parse::<SortStrategy>().expect("parse"),
            SortStrategy::PriceAsc
        );
        assert_eq!(
            "BEST_SELLER".parse::<SortStrategy>().expect("parse"),
            SortStrategy::BestSeller
        );
        assert!("cheapest".parse::<SortStrategy>().is_err());
    }

    #[test]
    fn sort_strategy_serde_matches_display() {
        for strategy in SortStrategy::all() {
            let json = serde_json::to_string(strategy).expect("serialize");
            assert_eq!(json, format!("\"{strategy}\""));
        }
    }
}
