//! Static exchange rates into the reference currency (USD).
//!
//! Rates are approximate and read-only once built. They exist so that
//! mixed-currency result pools can be compared, not for settlement.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{CurrencyCode, Money};

/// Built-in rates: units of USD per one unit of the currency.
const BUILTIN_RATES: &[(&str, Decimal)] = &[
    ("USD", dec!(1)),
    ("CLP", dec!(0.0011)),
    ("ARS", dec!(0.0011)),
    ("MXN", dec!(0.058)),
    ("COP", dec!(0.00025)),
    ("PEN", dec!(0.27)),
    ("BRL", dec!(0.20)),
    ("UYU", dec!(0.025)),
    ("EUR", dec!(1.08)),
    ("GBP", dec!(1.27)),
    ("CAD", dec!(0.74)),
    ("AUD", dec!(0.65)),
];

/// Read-only table of conversion rates to USD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRates {
    rates: BTreeMap<CurrencyCode, Decimal>,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ExchangeRates {
    /// The built-in approximate rate table.
    pub fn builtin() -> Self {
        let rates = BUILTIN_RATES
            .iter()
            .filter_map(|(code, rate)| Some((CurrencyCode::parse(code).ok()?, *rate)))
            .collect();
        Self { rates }
    }

    /// A table containing only USD.
    pub fn usd_only() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(CurrencyCode::usd(), Decimal::ONE);
        Self { rates }
    }

    /// Add or replace a rate. Non-positive rates are ignored.
    pub fn with_rate(mut self, currency: CurrencyCode, usd_per_unit: Decimal) -> Self {
        if usd_per_unit > Decimal::ZERO {
            self.rates.insert(currency, usd_per_unit);
        } else {
            tracing::warn!(%currency, rate = %usd_per_unit, "ignoring non-positive exchange rate");
        }
        self
    }

    /// USD per unit of `currency`, if known.
    pub fn rate(&self, currency: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Convert `money` into USD, if its currency is known.
    pub fn try_to_usd(&self, money: &Money) -> Option<Decimal> {
        self.rate(&money.currency).map(|rate| money.amount * rate)
    }

    /// Convert `money` into USD, treating an unknown currency as 1:1.
    pub fn to_usd(&self, money: &Money) -> Decimal {
        self.try_to_usd(money).unwrap_or_else(|| {
            tracing::warn!(
                currency = %money.currency,
                "no exchange rate for currency, assuming parity with USD"
            );
            money.amount
        })
    }

    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.rates.keys()
    }
}
