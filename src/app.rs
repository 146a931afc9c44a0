//! Wiring of marketplace adapters, tax calculator and orchestrator from
//! [`PricewiseConfig`].

use std::sync::Arc;
use std::time::Duration;

use pricewise_search::marketplaces::{
    EbayAdapter, EbayAuth, EbayConfig, MercadoLibreAdapter, MercadoLibreConfig,
};
use pricewise_search::{
    AdapterRegistry, AggregatedResult, CancellationToken, CurrencyCode, ExchangeRates,
    MarketplaceId, Orchestrator, ProductResult, SearchParams, SortStrategy, TaxCalculator,
    TaxEstimator, TaxTable,
};
use rust_decimal::Decimal;

use crate::config::{PricewiseConfig, TaxConfig};
use crate::error::{PricewiseError, Result};

/// A search as requested by a user. Unset fields take config defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Empty means `search.default_marketplaces`, or every registered
    /// marketplace when that is empty too.
    pub marketplaces: Vec<String>,
    pub country: Option<String>,
    pub sort: SortStrategy,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

/// A fully wired pricewise instance.
pub struct App {
    config: PricewiseConfig,
    orchestrator: Orchestrator,
    tax: Arc<TaxCalculator>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("marketplaces", &self.orchestrator.registry().registered_ids())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Validate `config` and build everything it describes.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid settings, an unreadable tax table or an
    /// unknown marketplace id.
    pub fn from_config(config: PricewiseConfig) -> Result<Self> {
        config.validate()?;
        let tax = Arc::new(build_tax_calculator(&config.tax)?);
        let registry = Arc::new(build_registry(&config)?);
        if registry.is_empty() {
            tracing::warn!("no marketplaces enabled; searches will fail");
        }
        let marketplaces = registry.len();
        let estimator: Arc<dyn TaxEstimator> = tax.clone();
        let orchestrator = Orchestrator::new(registry, config.orchestrator_config())?
            .with_exchange_rates(tax.exchange_rates().clone())
            .with_tax_estimator(estimator);
        tracing::info!(marketplaces, "pricewise ready");
        Ok(Self {
            config,
            orchestrator,
            tax,
        })
    }

    pub fn config(&self) -> &PricewiseConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn tax(&self) -> &TaxCalculator {
        &self.tax
    }

    /// Resolve `request` against config defaults and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`PricewiseError::Search`] wrapping the validation failure.
    pub fn search_params(&self, request: SearchRequest) -> Result<SearchParams> {
        let marketplaces = if !request.marketplaces.is_empty() {
            request.marketplaces
        } else if !self.config.search.default_marketplaces.is_empty() {
            self.config.search.default_marketplaces.clone()
        } else {
            self.orchestrator
                .registry()
                .registered_ids()
                .into_iter()
                .map(String::from)
                .collect()
        };

        let mut builder = SearchParams::builder(request.query)
            .marketplaces(marketplaces)
            .sort(request.sort)
            .page(request.page.unwrap_or(1))
            .page_size(request.page_size.unwrap_or(self.config.search.page_size));
        if let Some(country) = request
            .country
            .or_else(|| self.config.search.default_country.clone())
        {
            builder = builder.destination(country);
        }
        if let Some(min) = request.min_price {
            builder = builder.min_price(min);
        }
        if let Some(max) = request.max_price {
            builder = builder.max_price(max);
        }
        Ok(builder.build()?)
    }

    /// Run one search, abandoning it when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Invalid requests, cancellation, and searches where every marketplace
    /// failed.
    pub async fn search(
        &self,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResult> {
        let params = self.search_params(request)?;
        Ok(self.orchestrator.search_with_cancel(&params, cancel).await?)
    }

    /// Look up one listing.
    ///
    /// # Errors
    ///
    /// Invalid or unregistered marketplace ids and adapter failures.
    pub async fn product(&self, marketplace: &str, external_id: &str) -> Result<ProductResult> {
        let id = MarketplaceId::parse(marketplace)?;
        Ok(self.orchestrator.get_product(&id, external_id).await?)
    }
}

/// Built-in or file-based tax table plus exchange rate overrides.
///
/// # Errors
///
/// Returns an error if the table file cannot be loaded or a currency code
/// is malformed.
pub fn build_tax_calculator(config: &TaxConfig) -> Result<TaxCalculator> {
    let table = match &config.table_path {
        Some(path) => {
            let table = TaxTable::from_file(path)?;
            tracing::info!(path = %path.display(), countries = table.len(), "loaded tax table");
            table
        }
        None => TaxTable::builtin(),
    };
    let mut rates = ExchangeRates::builtin();
    for (code, rate) in &config.exchange_rates {
        let currency = CurrencyCode::parse(code)
            .map_err(|e| PricewiseError::Config(format!("tax.exchange_rates: {e}")))?;
        rates = rates.with_rate(currency, *rate);
    }
    Ok(TaxCalculator::new(table, rates))
}

/// Register every enabled marketplace adapter.
///
/// # Errors
///
/// Returns an error for unknown site/marketplace ids, bad base URLs or
/// missing eBay credentials.
pub fn build_registry(config: &PricewiseConfig) -> Result<AdapterRegistry> {
    let registry = AdapterRegistry::new();

    let meli = &config.mercadolibre;
    if meli.enabled {
        let meli_config = MercadoLibreConfig {
            base_url: meli.base_url.clone(),
            timeout: Duration::from_millis(meli.timeout_ms),
            retry: config.retry.clone(),
        };
        for site in &meli.sites {
            registry.register_adapter(Arc::new(MercadoLibreAdapter::new(site, &meli_config)?));
        }
    }

    let ebay = &config.ebay;
    if ebay.enabled {
        let ebay_config = EbayConfig {
            base_url: ebay.base_url.clone(),
            timeout: Duration::from_millis(ebay.timeout_ms),
            retry: config.retry.clone(),
            ..EbayConfig::new(ebay.app_id.clone(), ebay.cert_id.clone())
        };
        let auth = Arc::new(EbayAuth::new(&ebay_config)?);
        for marketplace in &ebay.marketplaces {
            let adapter = EbayAdapter::new(marketplace, &ebay_config, Arc::clone(&auth))?;
            registry.register_adapter(Arc::new(adapter));
        }
    }

    tracing::debug!(marketplaces = ?registry.registered_ids(), "marketplaces registered");
    Ok(registry)
}
