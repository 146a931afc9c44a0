//! Import tax estimation.
//!
//! The calculator is pure: a destination profile table and an exchange-rate
//! table go in at construction, and every estimate is a function of its
//! arguments. The orchestrator reaches it through [`TaxEstimator`] so tests
//! can substitute their own.

pub mod calculator;
pub mod exchange;
pub mod table;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TaxError;
use crate::types::{round_display, CountryCode, CurrencyCode, Money};

pub use calculator::{TaxCalculator, TaxRequest};
pub use exchange::ExchangeRates;
pub use table::{TaxProfile, TaxTable};

/// Something that can estimate import taxes for one purchase.
pub trait TaxEstimator: Send + Sync {
    /// Estimate taxes for buying an item priced `price` (plus optional
    /// `shipping`) shipped from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError`] when the destination has no profile or the
    /// amounts cannot be taxed. Callers treat this as "tax unknown".
    fn estimate(
        &self,
        price: &Money,
        shipping: Option<&Money>,
        origin: &CountryCode,
        destination: &CountryCode,
    ) -> Result<TaxBreakdown, TaxError>;
}

/// Landed-cost breakdown for one item, all amounts in USD.
///
/// Components keep full precision; use [`TaxBreakdown::rounded`] for
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub destination: CountryCode,
    pub destination_name: String,
    /// Always USD.
    pub currency: CurrencyCode,
    pub product_price: Decimal,
    pub shipping: Decimal,
    pub customs_duty: Decimal,
    pub vat: Decimal,
    pub total_with_taxes: Decimal,
    /// Duty rate applied, as a percentage.
    pub duty_rate_percent: Decimal,
    /// VAT rate applied, as a percentage.
    pub vat_rate_percent: Decimal,
    /// Price plus shipping fell at or under the de minimis threshold.
    pub de_minimis_exempt: bool,
    /// Origin and destination are the same country; no import applies.
    pub domestic: bool,
}

impl TaxBreakdown {
    /// Duty plus VAT.
    pub fn total_taxes(&self) -> Decimal {
        self.customs_duty + self.vat
    }

    /// The total as [`Money`].
    pub fn total(&self) -> Money {
        Money::new(self.total_with_taxes, self.currency.clone())
    }

    /// Copy with every amount rounded to cents.
    pub fn rounded(&self) -> Self {
        Self {
            product_price: round_display(self.product_price),
            shipping: round_display(self.shipping),
            customs_duty: round_display(self.customs_duty),
            vat: round_display(self.vat),
            total_with_taxes: round_display(self.total_with_taxes),
            ..self.clone()
        }
    }
}
