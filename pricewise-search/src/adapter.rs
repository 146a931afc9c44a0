//! Trait definition for pluggable marketplace backends.
//!
//! Each marketplace (MercadoLibre sites, eBay marketplaces, test doubles)
//! implements [`MarketplaceAdapter`] to give the orchestrator a uniform
//! interface for searching and looking up products.

use async_trait::async_trait;

use crate::error::MarketplaceError;
use crate::params::SearchParams;
use crate::types::{CountryCode, MarketplaceId, ProductResult, SearchPage};

/// A pluggable marketplace backend.
///
/// Implementors own their wire protocol, authentication, per-call timeout
/// and retry policy. Every failure must surface as a [`MarketplaceError`]
/// of the closest kind; raw transport errors never escape.
///
/// The trait is object safe so adapters can be stored as
/// `Arc<dyn MarketplaceAdapter>` in the registry.
#[async_trait]
pub trait MarketplaceAdapter: Send + Sync {
    /// Identifier this adapter answers for.
    fn marketplace_id(&self) -> &MarketplaceId;

    /// Human-readable name, e.g. "MercadoLibre Chile".
    fn display_name(&self) -> String;

    /// Country the listings ship from. Used as the tax origin.
    fn origin_country(&self) -> CountryCode;

    /// Search this marketplace for one page of results.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError`] once the adapter's own retry budget is
    /// exhausted or the failure is not retryable.
    async fn search(&self, params: &SearchParams) -> Result<SearchPage, MarketplaceError>;

    /// Fetch one product by its marketplace-specific id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError`] with kind `NotFound` if the product does
    /// not exist, or the closest kind for any other failure.
    async fn get_product(&self, external_id: &str) -> Result<ProductResult, MarketplaceError>;

    /// Best-effort liveness check. Never gates a search.
    async fn healthcheck(&self) -> bool;
}
