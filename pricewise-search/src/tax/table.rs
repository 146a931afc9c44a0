//! Destination tax profiles.
//!
//! A [`TaxTable`] maps destination countries to their VAT rate, average
//! import duty rate and de minimis threshold. The built-in table covers the
//! countries the bundled marketplaces sell into; a TOML file can replace it.
//!
//! ```toml
//! [countries.CL]
//! country_name = "Chile"
//! vat_rate_percent = 19
//! duty_rate_percent = 6
//! de_minimis_usd = 41
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TaxError;
use crate::types::CountryCode;

/// Tax rules for one destination country. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxProfile {
    pub country_name: String,
    pub vat_rate_percent: Decimal,
    pub duty_rate_percent: Decimal,
    /// Purchases with price + shipping at or under this amount pay nothing.
    pub de_minimis_usd: Decimal,
    /// Whether duty is charged on price plus shipping (CIF) rather than on
    /// price alone.
    #[serde(default)]
    pub duty_includes_shipping: bool,
}

impl TaxProfile {
    fn validate(&self, country: &CountryCode) -> Result<(), TaxError> {
        let negative = [
            ("vat_rate_percent", self.vat_rate_percent),
            ("duty_rate_percent", self.duty_rate_percent),
            ("de_minimis_usd", self.de_minimis_usd),
        ]
        .into_iter()
        .find(|(_, value)| *value < Decimal::ZERO);
        if let Some((field, _)) = negative {
            return Err(TaxError::Table(format!("{country}: {field} must not be negative")));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaxTableFile {
    #[serde(default)]
    countries: BTreeMap<CountryCode, TaxProfile>,
}

/// Read-only lookup of destination profiles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaxTable {
    profiles: BTreeMap<CountryCode, TaxProfile>,
}

impl TaxTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        // (code, name, vat, duty, de minimis, duty on CIF)
        let rows: &[(&str, &str, Decimal, Decimal, Decimal, bool)] = &[
            ("CL", "Chile", dec!(19), dec!(6), dec!(41), false),
            ("AR", "Argentina", dec!(21), dec!(20), dec!(0), false),
            ("MX", "Mexico", dec!(16), dec!(17), dec!(50), false),
            ("BR", "Brazil", dec!(17), dec!(60), dec!(0), false),
            ("CO", "Colombia", dec!(19), dec!(10), dec!(200), false),
            ("PE", "Peru", dec!(18), dec!(4), dec!(200), false),
            ("UY", "Uruguay", dec!(22), dec!(0), dec!(200), false),
            ("US", "United States", dec!(0), dec!(5), dec!(800), false),
            ("CA", "Canada", dec!(5), dec!(8), dec!(15), false),
            ("GB", "United Kingdom", dec!(20), dec!(4), dec!(0), true),
            ("DE", "Germany", dec!(19), dec!(4), dec!(0), true),
            ("ES", "Spain", dec!(21), dec!(4), dec!(0), true),
            ("FR", "France", dec!(20), dec!(4), dec!(0), true),
            ("IT", "Italy", dec!(22), dec!(4), dec!(0), true),
            ("AU", "Australia", dec!(10), dec!(5), dec!(0), false),
        ];
        let profiles = rows
            .iter()
            .filter_map(|(code, name, vat, duty, de_minimis, cif)| {
                let country = CountryCode::parse(code).ok()?;
                let profile = TaxProfile {
                    country_name: (*name).to_owned(),
                    vat_rate_percent: *vat,
                    duty_rate_percent: *duty,
                    de_minimis_usd: *de_minimis,
                    duty_includes_shipping: *cif,
                };
                Some((country, profile))
            })
            .collect();
        Self { profiles }
    }

    /// Parse a table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::Table`] if the text is not valid TOML, a country
    /// key is not an assigned code, or a rate is negative.
    pub fn from_toml_str(text: &str) -> Result<Self, TaxError> {
        let file: TaxTableFile =
            toml::from_str(text).map_err(|e| TaxError::Table(format!("invalid tax table: {e}")))?;
        for (country, profile) in &file.countries {
            profile.validate(country)?;
        }
        Ok(Self {
            profiles: file.countries,
        })
    }

    /// Load a table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::Table`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, TaxError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TaxError::Table(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serialize the table as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::Table`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, TaxError> {
        let file = TaxTableFile {
            countries: self.profiles.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| TaxError::Table(e.to_string()))
    }

    /// Add or replace one profile.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::Table`] if a rate is negative.
    pub fn with_profile(
        mut self,
        country: CountryCode,
        profile: TaxProfile,
    ) -> Result<Self, TaxError> {
        profile.validate(&country)?;
        self.profiles.insert(country, profile);
        Ok(self)
    }

    pub fn get(&self, country: &CountryCode) -> Option<&TaxProfile> {
        self.profiles.get(country)
    }

    /// Countries with a profile, sorted.
    pub fn supported_countries(&self) -> Vec<(CountryCode, &str)> {
        self.profiles
            .iter()
            .map(|(code, profile)| (code.clone(), profile.country_name.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cc(code: &str) -> CountryCode {
        CountryCode::parse(code).expect("valid")
    }

    #[test]
    fn builtin_covers_fifteen_countries() {
        let table = TaxTable::builtin();
        assert_eq!(table.len(), 15);
        let chile = table.get(&cc("CL")).expect("chile");
        assert_eq!(chile.vat_rate_percent, dec!(19));
        assert_eq!(chile.duty_rate_percent, dec!(6));
    }

    #[test]
    fn eu_profiles_tax_from_first_euro() {
        let table = TaxTable::builtin();
        for code in ["DE", "ES", "FR", "IT"] {
            let profile = table.get(&cc(code)).expect("eu profile");
            assert_eq!(profile.de_minimis_usd, Decimal::ZERO);
            assert!(profile.duty_includes_shipping);
        }
    }

    #[test]
    fn supported_countries_sorted() {
        let table = TaxTable::builtin();
        let codes: Vec<CountryCode> = table
            .supported_countries()
            .into_iter()
            .map(|(code, _)| code)
            .collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn parses_toml() {
        let table = TaxTable::from_toml_str(
            r#"
            [countries.NZ]
            country_name = "New Zealand"
            vat_rate_percent = 15
            duty_rate_percent = "5.5"
            de_minimis_usd = 0
            "#,
        )
        .expect("valid table");
        let nz = table.get(&cc("NZ")).expect("nz");
        assert_eq!(nz.duty_rate_percent, dec!(5.5));
        assert!(!nz.duty_includes_shipping);
    }

    #[test]
    fn rejects_unknown_country_key() {
        let err = TaxTable::from_toml_str(
            r#"
            [countries.XX]
            country_name = "Nowhere"
            vat_rate_percent = 1
            duty_rate_percent = 1
            de_minimis_usd = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, TaxError::Table(_)));
    }

    #[test]
    fn rejects_negative_rate() {
        let err = TaxTable::from_toml_str(
            r#"
            [countries.CL]
            country_name = "Chile"
            vat_rate_percent = -1
            duty_rate_percent = 6
            de_minimis_usd = 41
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("vat_rate_percent"));
    }

    #[test]
    fn toml_round_trip_preserves_builtin() {
        let table = TaxTable::builtin();
        let text = table.to_toml_string().expect("serialize");
        let back = TaxTable::from_toml_str(&text).expect("parse");
        assert_eq!(back, table);
    }
}
