//! Validated search request parameters.
//!
//! [`SearchParams`] is immutable once built. All validation happens in
//! [`SearchParamsBuilder::build`], so adapters and the orchestrator can rely
//! on its invariants without re-checking them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::types::{CountryCode, MarketplaceId, SortStrategy};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A validated multi-marketplace search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    query: String,
    marketplaces: Vec<MarketplaceId>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    destination: Option<CountryCode>,
    page: u32,
    page_size: u32,
    sort: SortStrategy,
}

impl SearchParams {
    /// Start building a request for `query`.
    pub fn builder(query: impl Into<String>) -> SearchParamsBuilder {
        SearchParamsBuilder::new(query)
    }

    /// Trimmed query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Requested marketplaces, first occurrence order, no duplicates.
    pub fn marketplaces(&self) -> &[MarketplaceId] {
        &self.marketplaces
    }

    pub fn min_price(&self) -> Option<Decimal> {
        self.min_price
    }

    pub fn max_price(&self) -> Option<Decimal> {
        self.max_price
    }

    /// Destination country for import tax estimates.
    pub fn destination(&self) -> Option<&CountryCode> {
        self.destination.as_ref()
    }

    /// One-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Zero-based offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        self.offset_for(self.page_size)
    }

    /// Offset of this page when a backend serves at most `limit` items per
    /// request.
    pub fn offset_for(&self, limit: u32) -> u64 {
        u64::from(self.page - 1) * u64::from(limit)
    }

    pub fn sort(&self) -> SortStrategy {
        self.sort
    }
}

/// Builder for [`SearchParams`].
#[derive(Debug, Clone)]
pub struct SearchParamsBuilder {
    query: String,
    marketplaces: Vec<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    destination: Option<String>,
    page: u32,
    page_size: u32,
    sort: SortStrategy,
}

impl SearchParamsBuilder {
    fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            marketplaces: Vec::new(),
            min_price: None,
            max_price: None,
            destination: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortStrategy::default(),
        }
    }

    /// Add one marketplace. Order of calls defines the requested order.
    pub fn marketplace(mut self, id: impl Into<String>) -> Self {
        self.marketplaces.push(id.into());
        self
    }

    pub fn marketplaces<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marketplaces.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn min_price(mut self, min: Decimal) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn max_price(mut self, max: Decimal) -> Self {
        self.max_price = Some(max);
        self
    }

    pub fn destination(mut self, country: impl Into<String>) -> Self {
        self.destination = Some(country.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn sort(mut self, sort: SortStrategy) -> Self {
        self.sort = sort;
        self
    }

    /// Validate and build the request.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidRequest`] when:
    /// - the query is empty after trimming
    /// - no marketplace is given, or an identifier is malformed
    /// - the destination is not an assigned ISO 3166-1 alpha-2 code
    /// - a price bound is negative, or min exceeds max
    /// - page is zero, or page size is outside `1..=100`
    pub fn build(self) -> Result<SearchParams, OrchestratorError> {
        let query = self.query.trim().to_owned();
        if query.is_empty() {
            return Err(invalid("query must not be empty"));
        }

        let mut marketplaces: Vec<MarketplaceId> = Vec::with_capacity(self.marketplaces.len());
        for raw in &self.marketplaces {
            let id = MarketplaceId::parse(raw)?;
            if !marketplaces.contains(&id) {
                marketplaces.push(id);
            }
        }
        if marketplaces.is_empty() {
            return Err(invalid("at least one marketplace must be selected"));
        }

        let destination = self
            .destination
            .as_deref()
            .map(CountryCode::parse)
            .transpose()?;

        for bound in [self.min_price, self.max_price].into_iter().flatten() {
            if bound.is_sign_negative() && !bound.is_zero() {
                return Err(invalid("price bounds must not be negative"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(invalid("min_price must be <= max_price"));
            }
        }

        if self.page == 0 {
            return Err(invalid("page must be at least 1"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid(&format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(SearchParams {
            query,
            marketplaces,
            min_price: self.min_price,
            max_price: self.max_price,
            destination,
            page: self.page,
            page_size: self.page_size,
            sort: self.sort,
        })
    }
}

fn invalid(msg: &str) -> OrchestratorError {
    OrchestratorError::InvalidRequest(msg.to_owned())
}
