//! Configuration file for the pricewise host.
//!
//! Every section is optional; missing fields fall back to defaults. eBay
//! credentials may come from the environment (`EBAY_APP_ID`,
//! `EBAY_CERT_ID`) instead of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pricewise_search::marketplaces::{ebay, mercadolibre};
use pricewise_search::params::DEFAULT_PAGE_SIZE;
use pricewise_search::{OrchestratorConfig, RetryPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PricewiseError, Result};

/// Environment variable overriding `ebay.app_id`.
pub const ENV_EBAY_APP_ID: &str = "EBAY_APP_ID";
/// Environment variable overriding `ebay.cert_id`.
pub const ENV_EBAY_CERT_ID: &str = "EBAY_CERT_ID";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricewiseConfig {
    /// Orchestration and request defaults.
    pub search: SearchConfig,
    /// Retry policy applied to every marketplace adapter.
    pub retry: RetryPolicy,
    /// Tax table and exchange rate overrides.
    pub tax: TaxConfig,
    /// MercadoLibre sites.
    pub mercadolibre: MercadoLibreSection,
    /// eBay marketplaces and credentials.
    pub ebay: EbaySection,
    /// Log filter and optional log directory.
    pub logging: LoggingConfig,
}

/// Orchestration settings and CLI defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Shared deadline for one search, in milliseconds.
    pub deadline_ms: u64,
    /// Healthcheck bound per marketplace, in milliseconds.
    pub health_timeout_ms: u64,
    /// Result cache TTL in seconds. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Maximum cached result pages.
    pub cache_capacity: u64,
    /// Marketplaces searched when none are named on the command line.
    pub default_marketplaces: Vec<String>,
    /// Destination country used when none is given (ISO 3166-1 alpha-2).
    pub default_country: Option<String>,
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        Self {
            deadline_ms: duration_ms(orchestrator.deadline),
            health_timeout_ms: duration_ms(orchestrator.health_timeout),
            cache_ttl_secs: orchestrator.cache_ttl.as_secs(),
            cache_capacity: orchestrator.cache_capacity,
            default_marketplaces: vec!["MLC".into()],
            default_country: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Tax settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    /// TOML tax table replacing the built-in one.
    pub table_path: Option<PathBuf>,
    /// USD per unit of currency, added to or replacing the built-in rates.
    pub exchange_rates: BTreeMap<String, Decimal>,
}

/// MercadoLibre settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MercadoLibreSection {
    pub enabled: bool,
    /// Site ids to register (e.g. `MLC`, `MLA`).
    pub sites: Vec<String>,
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for MercadoLibreSection {
    fn default() -> Self {
        Self {
            enabled: true,
            sites: ["MLA", "MLB", "MLC", "MLM", "MCO", "MPE", "MLU"]
                .into_iter()
                .map(String::from)
                .collect(),
            base_url: mercadolibre::DEFAULT_BASE_URL.into(),
            timeout_ms: 4_000,
        }
    }
}

/// eBay settings. Disabled until credentials are present.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EbaySection {
    pub enabled: bool,
    /// OAuth client id.
    pub app_id: String,
    /// OAuth client secret.
    pub cert_id: String,
    /// Marketplace ids to register (e.g. `EBAY_US`).
    pub marketplaces: Vec<String>,
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for EbaySection {
    fn default() -> Self {
        Self {
            enabled: false,
            app_id: String::new(),
            cert_id: String::new(),
            marketplaces: vec!["EBAY_US".into()],
            base_url: ebay::DEFAULT_BASE_URL.into(),
            timeout_ms: 4_000,
        }
    }
}

impl std::fmt::Debug for EbaySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbaySection")
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("cert_id", &"<redacted>")
            .field("marketplaces", &self.marketplaces)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl EbaySection {
    /// Whether both credentials are set.
    pub fn has_credentials(&self) -> bool {
        !self.app_id.trim().is_empty() && !self.cert_id.trim().is_empty()
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "pricewise=info,pricewise_search=info".into(),
            directory: None,
        }
    }
}

impl PricewiseConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PricewiseError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PricewiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path, e.g. `~/.config/pricewise/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Load from `path`, or from the default path when it exists, or use
    /// defaults. Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply credential overrides looked up through `lookup`. Setting both
    /// eBay credentials enables eBay.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let app_id = lookup(ENV_EBAY_APP_ID).filter(|v| !v.trim().is_empty());
        let cert_id = lookup(ENV_EBAY_CERT_ID).filter(|v| !v.trim().is_empty());
        let supplied = app_id.is_some() || cert_id.is_some();
        if let Some(app_id) = app_id {
            self.ebay.app_id = app_id;
        }
        if let Some(cert_id) = cert_id {
            self.ebay.cert_id = cert_id;
        }
        if supplied && self.ebay.has_credentials() {
            self.ebay.enabled = true;
        }
    }

    /// Orchestrator settings derived from `[search]`.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            deadline: Duration::from_millis(self.search.deadline_ms),
            health_timeout: Duration::from_millis(self.search.health_timeout_ms),
            cache_ttl: Duration::from_secs(self.search.cache_ttl_secs),
            cache_capacity: self.search.cache_capacity,
        }
    }

    /// Check the whole file before anything is wired.
    ///
    /// # Errors
    ///
    /// Returns [`PricewiseError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.orchestrator_config()
            .validate()
            .map_err(|e| PricewiseError::Config(e.to_string()))?;
        if self.search.page_size == 0
            || self.search.page_size > pricewise_search::params::MAX_PAGE_SIZE
        {
            return Err(PricewiseError::Config(format!(
                "search.page_size must be between 1 and {}",
                pricewise_search::params::MAX_PAGE_SIZE
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PricewiseError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.ebay.enabled && !self.ebay.has_credentials() {
            return Err(PricewiseError::Config(format!(
                "ebay is enabled but app_id/cert_id are missing (set {ENV_EBAY_APP_ID} and {ENV_EBAY_CERT_ID})"
            )));
        }
        if let Some((currency, _)) = self
            .tax
            .exchange_rates
            .iter()
            .find(|(_, rate)| **rate <= Decimal::ZERO)
        {
            return Err(PricewiseError::Config(format!(
                "tax.exchange_rates.{currency} must be positive"
            )));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
