//! In-memory TTL cache for aggregated search results.
//!
//! Keyed by the normalised request. Uses [`moka`] for async-friendly
//! caching with TTL expiry and bounded capacity. Each orchestrator owns its
//! cache instance; there is no process-wide cache.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;

use crate::error::CacheError;
use crate::params::SearchParams;
use crate::types::{AggregatedResult, CountryCode, MarketplaceId, SortStrategy};

/// Deterministic cache key for a search request.
///
/// The query is trimmed and lower-cased and price bounds are normalised so
/// `10` and `10.00` match. Marketplace order is kept: the relevance
/// interleave depends on it, so `[A, B]` and `[B, A]` are different requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    marketplaces: Vec<MarketplaceId>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    destination: Option<CountryCode>,
    page: u32,
    page_size: u32,
    sort: SortStrategy,
}

impl CacheKey {
    /// Build the key for `params`.
    pub fn new(params: &SearchParams) -> Self {
        Self {
            query: params.query().trim().to_lowercase(),
            marketplaces: params.marketplaces().to_vec(),
            min_price: params.min_price().map(|d| d.normalize()),
            max_price: params.max_price().map(|d| d.normalize()),
            destination: params.destination().cloned(),
            page: params.page(),
            page_size: params.page_size(),
            sort: params.sort(),
        }
    }
}

/// Storage for aggregated results.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Return the cached result for `key`, if present and not expired.
    async fn get(&self, key: &CacheKey) -> Option<AggregatedResult>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the value could not be stored. Callers log
    /// and continue.
    async fn put(&self, key: CacheKey, value: AggregatedResult) -> Result<(), CacheError>;

    /// Drop every entry.
    async fn clear(&self);
}

/// [`ResultCache`] backed by a moka future cache.
#[derive(Clone)]
pub struct MokaResultCache {
    inner: Cache<CacheKey, AggregatedResult>,
}

impl MokaResultCache {
    /// Create a cache holding up to `capacity` results for `ttl` each.
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Number of live entries (approximate, moka counts lazily).
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for MokaResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaResultCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[async_trait]
impl ResultCache for MokaResultCache {
    async fn get(&self, key: &CacheKey) -> Option<AggregatedResult> {
        self.inner.get(key).await
    }

    async fn put(&self, key: CacheKey, value: AggregatedResult) -> Result<(), CacheError> {
        self.inner.insert(key, value).await;
        Ok(())
    }

    async fn clear(&self) {
        self.inner.invalidate_all();
    }
}
