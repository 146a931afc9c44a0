//! # pricewise-search
//!
//! Multi-marketplace product search with landed-cost estimates.
//!
//! One logical query fans out to many marketplace backends concurrently.
//! Their answers are merged into one deterministic page, annotated with an
//! import tax estimate for the buyer's country, and the cheapest landed
//! cost is flagged.
//!
//! ## Design
//!
//! - Backends plug in through the [`MarketplaceAdapter`] trait and an
//!   [`AdapterRegistry`]; the orchestrator never names concrete adapters
//! - One shared deadline bounds every search; late marketplaces are
//!   reported as timed out and their results discarded
//! - Partial failure is normal: failed marketplaces are listed next to the
//!   results, and only a complete wipeout is an error
//! - Sorting is a total order, so completion order never shows in output
//! - Money is [`rust_decimal::Decimal`]; rounding happens only for display
//! - Aggregated results are cached per orchestrator with a short TTL
//!
//! ## Security
//!
//! - Credentials never appear in errors or `Debug` output
//! - Search queries are logged only at debug level
//! - Response bodies are never copied into error messages

pub mod adapter;
pub mod cache;
pub mod config;
pub mod country;
pub mod error;
pub mod http;
pub mod marketplaces;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod retry;
pub mod tax;
pub mod types;

pub use adapter::MarketplaceAdapter;
pub use cache::{CacheKey, MokaResultCache, ResultCache};
pub use config::OrchestratorConfig;
pub use error::{
    CacheError, MarketplaceError, MarketplaceErrorKind, OrchestratorError, RegistryError, Result,
    TaxError,
};
pub use orchestrator::Orchestrator;
pub use params::{SearchParams, SearchParamsBuilder};
pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;
pub use tax::{ExchangeRates, TaxBreakdown, TaxCalculator, TaxEstimator, TaxProfile, TaxTable};
pub use types::{
    AggregatedResult, Condition, CountryCode, CurrencyCode, MarketplaceId, Money, ProductResult,
    RankedProduct, SearchPage, SortStrategy,
};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn invalid_config_surfaces_before_any_search() {
        let config = OrchestratorConfig {
            health_timeout: std::time::Duration::ZERO,
            ..Default::default()
        };
        let result = Orchestrator::new(Arc::new(AdapterRegistry::new()), config);
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn public_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Orchestrator>();
        assert_send_sync::<AdapterRegistry>();
        assert_send_sync::<AggregatedResult>();
        assert_send_sync::<SearchParams>();
        assert_send_sync::<TaxCalculator>();
    }
}
