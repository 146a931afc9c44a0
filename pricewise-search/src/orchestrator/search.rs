//! Core search orchestrator: concurrent multi-marketplace fan-out under a
//! deadline, partial-failure collection, tax overlay, deterministic ranking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::adapter::MarketplaceAdapter;
use crate::cache::{CacheKey, MokaResultCache, ResultCache};
use crate::config::OrchestratorConfig;
use crate::error::{MarketplaceError, OrchestratorError, Result};
use crate::params::SearchParams;
use crate::registry::AdapterRegistry;
use crate::tax::{ExchangeRates, TaxBreakdown, TaxCalculator, TaxEstimator};
use crate::types::{
    AggregatedResult, CountryCode, MarketplaceId, Money, ProductResult, RankedProduct, SearchPage,
};

use super::dedup::dedupe_by_identity;
use super::sorting::{price_ranks, sort_candidates, Candidate};

/// Outcome of one marketplace branch, stored at its requested position.
type Slot = Option<std::result::Result<SearchPage, MarketplaceError>>;

/// Fans one search out to many marketplaces and merges the answers.
///
/// Holds no per-request state; one instance serves any number of
/// concurrent searches.
pub struct Orchestrator {
    registry: Arc<AdapterRegistry>,
    config: OrchestratorConfig,
    tax: Option<Arc<dyn TaxEstimator>>,
    rates: Arc<ExchangeRates>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("tax", &self.tax.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator with the built-in tax calculator and, when
    /// `config.cache_ttl` is non-zero, a private moka cache.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if `config` is invalid.
    pub fn new(registry: Arc<AdapterRegistry>, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let cache: Option<Arc<dyn ResultCache>> = if config.caching_enabled() {
            Some(Arc::new(MokaResultCache::new(
                config.cache_ttl,
                config.cache_capacity,
            )))
        } else {
            None
        };
        let calculator = TaxCalculator::default();
        let rates = Arc::new(calculator.exchange_rates().clone());
        Ok(Self {
            registry,
            config,
            tax: Some(Arc::new(calculator)),
            rates,
            cache,
        })
    }

    /// Replace the tax estimator.
    pub fn with_tax_estimator(mut self, estimator: Arc<dyn TaxEstimator>) -> Self {
        self.tax = Some(estimator);
        self
    }

    /// Never attach tax estimates, even when a destination is given.
    pub fn without_tax(mut self) -> Self {
        self.tax = None;
        self
    }

    /// Use `rates` when comparing costs of untaxed items.
    pub fn with_exchange_rates(mut self, rates: ExchangeRates) -> Self {
        self.rates = Arc::new(rates);
        self
    }

    /// Replace the result cache.
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Search every requested marketplace and merge the results.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::AllBackendsFailed`] only if **every**
    /// requested marketplace fails. Partial failures are reported in
    /// [`AggregatedResult::failures`].
    pub async fn search(&self, params: &SearchParams) -> Result<AggregatedResult> {
        self.search_with_cancel(params, &CancellationToken::new())
            .await
    }

    /// Like [`Orchestrator::search`], aborting every outstanding call as
    /// soon as `cancel` fires.
    ///
    /// # Pipeline
    ///
    /// 1. Return a cached result if one is live
    /// 2. Resolve ids; unregistered ones fail as unreachable
    /// 3. Fan out concurrently, waiting at most `config.deadline`
    /// 4. Fail with `AllBackendsFailed` if nothing succeeded
    /// 5. Deduplicate per marketplace, attach tax and comparable cost
    /// 6. Sort, truncate to the page size, mark the best price
    /// 7. Write the result back to the cache
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::search`], plus [`OrchestratorError::Cancelled`].
    pub async fn search_with_cancel(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResult> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        tracing::debug!(query = %params.query(), sort = %params.sort(), "search requested");

        let key = self.cache.as_ref().map(|_| CacheKey::new(params));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(mut hit) = cache.get(key).await {
                tracing::debug!("serving search from cache");
                // Keys ignore case; report the query as this caller typed it.
                hit.query = params.query().to_owned();
                return Ok(hit);
            }
        }

        let (slots, origins) = self.fan_out(params, cancel).await?;
        let result = self.aggregate(params, slots, &origins)?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Err(err) = cache.put(key, result.clone()).await {
                tracing::warn!(error = %err, "failed to cache search result");
            }
        }
        Ok(result)
    }

    /// Dispatch every resolved adapter and collect outcomes by position.
    async fn fan_out(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Slot>, Vec<Option<CountryCode>>)> {
        let requested = params.marketplaces();
        let mut slots: Vec<Slot> = (0..requested.len()).map(|_| None).collect();
        let mut origins: Vec<Option<CountryCode>> = vec![None; requested.len()];

        let branch_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::with_capacity(requested.len());

        for (position, id) in requested.iter().enumerate() {
            let adapter = match self.registry.resolve(id) {
                Ok(adapter) => adapter,
                Err(err) => {
                    tracing::warn!(marketplace = %id, "no adapter registered");
                    slots[position] = Some(Err(MarketplaceError::unreachable(
                        id.clone(),
                        err.to_string(),
                    )));
                    continue;
                }
            };
            origins[position] = Some(adapter.origin_country());

            let span = tracing::info_span!("marketplace_search", marketplace = %id);
            let handle = tasks.spawn(
                run_branch(adapter, params.clone(), branch_cancel.clone()).instrument(span),
            );
            positions.insert(handle.id(), position);
        }

        let deadline = tokio::time::sleep(self.config.deadline);
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(pending = tasks.len(), "search cancelled by caller");
                    branch_cancel.cancel();
                    tasks.abort_all();
                    return Err(OrchestratorError::Cancelled);
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        pending = tasks.len(),
                        deadline_ms = self.config.deadline.as_millis() as u64,
                        "search deadline elapsed"
                    );
                    break;
                }
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((task_id, outcome))) => {
                        if let Some(&position) = positions.get(&task_id) {
                            slots[position] = Some(outcome);
                        }
                    }
                    Some(Err(join_err)) => {
                        if let Some(&position) = positions.get(&join_err.id()) {
                            tracing::error!(
                                marketplace = %requested[position],
                                error = %join_err,
                                "marketplace task failed"
                            );
                            slots[position] = Some(Err(MarketplaceError::invalid_response(
                                requested[position].clone(),
                                "adapter task panicked",
                            )));
                        }
                    }
                    None => break,
                },
            }
        }

        branch_cancel.cancel();
        tasks.abort_all();

        for (position, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Err(MarketplaceError::timeout(
                    requested[position].clone(),
                    format!(
                        "no response within {} ms",
                        self.config.deadline.as_millis()
                    ),
                )));
            }
        }
        Ok((slots, origins))
    }

    /// Merge per-marketplace outcomes into the final page.
    fn aggregate(
        &self,
        params: &SearchParams,
        slots: Vec<Slot>,
        origins: &[Option<CountryCode>],
    ) -> Result<AggregatedResult> {
        let requested = params.marketplaces();
        let mut failures = BTreeMap::new();
        let mut succeeded = Vec::new();
        let mut total_count: u64 = 0;
        let mut adapter_has_more = false;
        let mut pool = Vec::new();

        for (position, slot) in slots.into_iter().enumerate() {
            let id = &requested[position];
            match slot {
                Some(Ok(page)) => {
                    tracing::debug!(
                        marketplace = %id,
                        count = page.products.len(),
                        total = page.total_count,
                        "marketplace returned results"
                    );
                    succeeded.push(id.clone());
                    total_count = total_count.saturating_add(page.total_count);
                    adapter_has_more |= page.has_more;
                    let origin = origins[position].as_ref();
                    for (rank, product) in dedupe_by_identity(page.products).into_iter().enumerate()
                    {
                        pool.push(self.candidate(product, origin, params, position, rank));
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        marketplace = %id,
                        kind = %err.kind,
                        error = %err,
                        "marketplace search failed"
                    );
                    failures.insert(id.clone(), err);
                }
                None => {
                    failures.insert(
                        id.clone(),
                        MarketplaceError::timeout(id.clone(), "no response"),
                    );
                }
            }
        }

        if succeeded.is_empty() {
            return Err(OrchestratorError::AllBackendsFailed { failures });
        }

        sort_candidates(&mut pool, params.sort());
        let page_size = params.page_size() as usize;
        let has_more = pool.len() > page_size || adapter_has_more;
        pool.truncate(page_size);

        let ranks = price_ranks(&pool);
        let items = pool
            .into_iter()
            .zip(ranks)
            .map(|(c, price_rank)| RankedProduct {
                product: c.product,
                tax: c.tax,
                total_cost: Money::usd(c.cost),
                best_price: price_rank == 1,
                price_rank,
            })
            .collect();

        Ok(AggregatedResult {
            query: params.query().to_owned(),
            items,
            total_count,
            has_more,
            sort: params.sort(),
            succeeded,
            failures,
        })
    }

    fn candidate(
        &self,
        product: ProductResult,
        origin: Option<&CountryCode>,
        params: &SearchParams,
        position: usize,
        rank: usize,
    ) -> Candidate {
        let tax = self.estimate_tax(&product, origin, params.destination());
        let cost = match &tax {
            Some(breakdown) => breakdown.total_with_taxes,
            None => {
                let shipping = product
                    .shipping
                    .as_ref()
                    .map_or(Decimal::ZERO, |s| self.rates.to_usd(s));
                self.rates.to_usd(&product.price) + shipping
            }
        };
        Candidate {
            product,
            tax,
            cost,
            position,
            rank,
        }
    }

    fn estimate_tax(
        &self,
        product: &ProductResult,
        origin: Option<&CountryCode>,
        destination: Option<&CountryCode>,
    ) -> Option<TaxBreakdown> {
        let (estimator, origin, destination) = (self.tax.as_ref()?, origin?, destination?);
        match estimator.estimate(&product.price, product.shipping.as_ref(), origin, destination) {
            Ok(breakdown) => Some(breakdown),
            Err(err) => {
                tracing::debug!(
                    marketplace = %product.marketplace,
                    product = %product.external_id,
                    error = %err,
                    "tax estimate unavailable"
                );
                None
            }
        }
    }

    /// Fetch one product from one marketplace under the search deadline.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::UnknownMarketplace`] if nothing is registered
    ///   for `marketplace`.
    /// - [`OrchestratorError::Marketplace`] if the adapter fails or does not
    ///   answer before the deadline.
    pub async fn get_product(
        &self,
        marketplace: &MarketplaceId,
        external_id: &str,
    ) -> Result<ProductResult> {
        let adapter = self
            .registry
            .resolve(marketplace)
            .map_err(|_| OrchestratorError::UnknownMarketplace(marketplace.clone()))?;
        match tokio::time::timeout(self.config.deadline, adapter.get_product(external_id)).await {
            Ok(Ok(product)) => Ok(product),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(MarketplaceError::timeout(
                marketplace.clone(),
                format!("no response within {} ms", self.config.deadline.as_millis()),
            )
            .into()),
        }
    }

    /// Check every registered adapter concurrently. An adapter that does
    /// not answer within `config.health_timeout` counts as unhealthy.
    pub async fn healthcheck(&self) -> BTreeMap<MarketplaceId, bool> {
        let timeout = self.config.health_timeout;
        let checks = self.registry.adapters().into_iter().map(|(id, adapter)| async move {
            let healthy = tokio::time::timeout(timeout, adapter.healthcheck())
                .await
                .unwrap_or(false);
            if !healthy {
                tracing::info!(marketplace = %id, "marketplace unhealthy");
            }
            (id, healthy)
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }
}

/// One adapter call, abandoned as soon as the branch token fires.
async fn run_branch(
    adapter: Arc<dyn MarketplaceAdapter>,
    params: SearchParams,
    cancel: CancellationToken,
) -> std::result::Result<SearchPage, MarketplaceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MarketplaceError::timeout(
            adapter.marketplace_id().clone(),
            "abandoned",
        )),
        outcome = adapter.search(&params) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortStrategy;

    #[test]
    fn zero_deadline_rejected_at_construction() {
        let config = OrchestratorConfig {
            deadline: std::time::Duration::ZERO,
            ..Default::default()
        };
        let err = Orchestrator::new(Arc::new(AdapterRegistry::new()), config).unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[tokio::test]
    async fn only_unregistered_marketplaces_fail_as_unreachable() {
        let orchestrator =
            Orchestrator::new(Arc::new(AdapterRegistry::new()), OrchestratorConfig::default())
                .expect("valid config");
        let params = SearchParams::builder("laptop")
            .marketplaces(["MLC", "EBAY_US"])
            .sort(SortStrategy::PriceAsc)
            .build()
            .expect("valid");
        let err = orchestrator.search(&params).await.unwrap_err();
        match err {
            OrchestratorError::AllBackendsFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures
                    .values()
                    .all(|e| e.kind == crate::MarketplaceErrorKind::Unreachable));
            }
            other => panic!("expected AllBackendsFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let orchestrator =
            Orchestrator::new(Arc::new(AdapterRegistry::new()), OrchestratorConfig::default())
                .expect("valid config");
        let params = SearchParams::builder("x")
            .marketplace("MLC")
            .build()
            .expect("valid");
        let token = CancellationToken::new();
        token.cancel();
        let err = orchestrator
            .search_with_cancel(&params, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Cancelled));
    }

    #[tokio::test]
    async fn get_product_unknown_marketplace() {
        let orchestrator =
            Orchestrator::new(Arc::new(AdapterRegistry::new()), OrchestratorConfig::default())
                .expect("valid config");
        let id = MarketplaceId::parse("MLC").expect("valid");
        let err = orchestrator.get_product(&id, "1").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownMarketplace(_)));
    }

    #[tokio::test]
    async fn healthcheck_empty_registry() {
        let orchestrator =
            Orchestrator::new(Arc::new(AdapterRegistry::new()), OrchestratorConfig::default())
                .expect("valid config");
        assert!(orchestrator.healthcheck().await.is_empty());
    }
}
