//! Landed-cost calculation.
//!
//! ```text
//! value   = price + shipping                       (converted to USD)
//! value <= de minimis       -> duty = 0, VAT = 0, exempt
//! duty    = price x duty%      (or value x duty% for CIF profiles)
//! VAT     = (value + duty) x VAT%
//! total   = value + duty + VAT
//! ```
//!
//! Intermediate amounts are never rounded.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::exchange::ExchangeRates;
use super::table::TaxTable;
use super::{TaxBreakdown, TaxEstimator};
use crate::error::TaxError;
use crate::types::{CountryCode, CurrencyCode, Money};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// One purchase to estimate, for [`TaxCalculator::calculate_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxRequest {
    pub price: Money,
    pub shipping: Option<Money>,
    pub origin: CountryCode,
    pub destination: CountryCode,
}

/// Table-driven import tax calculator.
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    table: Arc<TaxTable>,
    rates: Arc<ExchangeRates>,
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new(TaxTable::builtin(), ExchangeRates::builtin())
    }
}

impl TaxCalculator {
    pub fn new(table: TaxTable, rates: ExchangeRates) -> Self {
        Self {
            table: Arc::new(table),
            rates: Arc::new(rates),
        }
    }

    pub fn table(&self) -> &TaxTable {
        &self.table
    }

    pub fn exchange_rates(&self) -> &ExchangeRates {
        &self.rates
    }

    /// Countries this calculator can estimate for, with their names.
    pub fn supported_countries(&self) -> Vec<(CountryCode, &str)> {
        self.table.supported_countries()
    }

    /// Estimate import taxes for one purchase.
    ///
    /// # Errors
    ///
    /// - [`TaxError::InvalidAmount`] if an amount is negative or shipping is
    ///   priced in a different currency from the item.
    /// - [`TaxError::UnknownDestination`] if the destination has no profile
    ///   and the purchase is not domestic.
    pub fn calculate(
        &self,
        price: &Money,
        shipping: Option<&Money>,
        origin: &CountryCode,
        destination: &CountryCode,
    ) -> Result<TaxBreakdown, TaxError> {
        if price.amount < Decimal::ZERO {
            return Err(TaxError::InvalidAmount("price must not be negative".into()));
        }
        if let Some(shipping) = shipping {
            if shipping.amount < Decimal::ZERO {
                return Err(TaxError::InvalidAmount(
                    "shipping must not be negative".into(),
                ));
            }
            if shipping.currency != price.currency {
                return Err(TaxError::InvalidAmount(format!(
                    "shipping currency {} differs from price currency {}",
                    shipping.currency, price.currency
                )));
            }
        }

        let price_usd = self.rates.to_usd(price);
        let shipping_usd = shipping.map_or(Decimal::ZERO, |s| self.rates.to_usd(s));
        let value = price_usd + shipping_usd;
        let profile = self.table.get(destination);

        if origin == destination {
            let name = profile.map_or_else(|| destination.to_string(), |p| p.country_name.clone());
            return Ok(TaxBreakdown {
                destination: destination.clone(),
                destination_name: name,
                currency: CurrencyCode::usd(),
                product_price: price_usd,
                shipping: shipping_usd,
                customs_duty: Decimal::ZERO,
                vat: Decimal::ZERO,
                total_with_taxes: value,
                duty_rate_percent: Decimal::ZERO,
                vat_rate_percent: Decimal::ZERO,
                de_minimis_exempt: false,
                domestic: true,
            });
        }

        let profile = profile.ok_or_else(|| TaxError::UnknownDestination(destination.clone()))?;

        let mut breakdown = TaxBreakdown {
            destination: destination.clone(),
            destination_name: profile.country_name.clone(),
            currency: CurrencyCode::usd(),
            product_price: price_usd,
            shipping: shipping_usd,
            customs_duty: Decimal::ZERO,
            vat: Decimal::ZERO,
            total_with_taxes: value,
            duty_rate_percent: profile.duty_rate_percent,
            vat_rate_percent: profile.vat_rate_percent,
            de_minimis_exempt: false,
            domestic: false,
        };

        if value <= profile.de_minimis_usd {
            breakdown.de_minimis_exempt = true;
            return Ok(breakdown);
        }

        let dutiable = if profile.duty_includes_shipping {
            value
        } else {
            price_usd
        };
        let duty = dutiable * profile.duty_rate_percent / HUNDRED;
        let vat = (value + duty) * profile.vat_rate_percent / HUNDRED;

        breakdown.customs_duty = duty;
        breakdown.vat = vat;
        breakdown.total_with_taxes = value + duty + vat;
        Ok(breakdown)
    }

    /// Estimate many purchases; each result is independent.
    pub fn calculate_batch(&self, requests: &[TaxRequest]) -> Vec<Result<TaxBreakdown, TaxError>> {
        requests
            .iter()
            .map(|r| self.calculate(&r.price, r.shipping.as_ref(), &r.origin, &r.destination))
            .collect()
    }
}

impl TaxEstimator for TaxCalculator {
    fn estimate(
        &self,
        price: &Money,
        shipping: Option<&Money>,
        origin: &CountryCode,
        destination: &CountryCode,
    ) -> Result<TaxBreakdown, TaxError> {
        self.calculate(price, shipping, origin, destination)
    }
}
