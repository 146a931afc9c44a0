//! MercadoLibre public search API.
//!
//! One adapter per site (MLC, MLA, ...). Search needs no credentials:
//! `GET /sites/{site}/search`, `GET /items/{id}` and, for health,
//! `GET /sites/{site}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use super::{endpoint, item_endpoint, parse_base_url, parse_condition};
use crate::adapter::MarketplaceAdapter;
use crate::error::{MarketplaceError, OrchestratorError};
use crate::http::{build_client, send_json};
use crate::params::SearchParams;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::types::{
    CountryCode, CurrencyCode, MarketplaceId, Money, ProductResult, SearchPage, SortStrategy,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.mercadolibre.com";

/// Largest page the search endpoint serves.
pub const MAX_LIMIT: u32 = 50;

/// Known sites: (site id, country code, country name).
pub const MELI_SITES: &[(&str, &str, &str)] = &[
    ("MLA", "AR", "Argentina"),
    ("MLB", "BR", "Brasil"),
    ("MLC", "CL", "Chile"),
    ("MLM", "MX", "México"),
    ("MCO", "CO", "Colombia"),
    ("MPE", "PE", "Perú"),
    ("MLU", "UY", "Uruguay"),
    ("MLV", "VE", "Venezuela"),
    ("MEC", "EC", "Ecuador"),
    ("MBO", "BO", "Bolivia"),
    ("MPY", "PY", "Paraguay"),
    ("MCR", "CR", "Costa Rica"),
    ("MPA", "PA", "Panamá"),
    ("MRD", "DO", "República Dominicana"),
    ("MGT", "GT", "Guatemala"),
    ("MHN", "HN", "Honduras"),
    ("MSV", "SV", "El Salvador"),
    ("MNI", "NI", "Nicaragua"),
];

/// Settings shared by every MercadoLibre site adapter.
#[derive(Debug, Clone)]
pub struct MercadoLibreConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for MercadoLibreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(4),
            retry: RetryPolicy::default(),
        }
    }
}

/// Adapter for one MercadoLibre site.
#[derive(Debug, Clone)]
pub struct MercadoLibreAdapter {
    id: MarketplaceId,
    country: CountryCode,
    country_name: &'static str,
    base_url: Url,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl MercadoLibreAdapter {
    /// Create an adapter for `site_id` (e.g. `MLC`).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] for an unknown site or a bad
    /// base URL.
    pub fn new(site_id: &str, config: &MercadoLibreConfig) -> Result<Self, OrchestratorError> {
        let id = MarketplaceId::parse(site_id)?;
        let &(_, country, country_name) = MELI_SITES
            .iter()
            .find(|(site, _, _)| *site == id.as_str())
            .ok_or_else(|| OrchestratorError::Config(format!("unknown MercadoLibre site {id}")))?;
        let country = CountryCode::parse(country)?;
        let base_url = parse_base_url(&config.base_url)?;
        let client = build_client(&id, config.timeout)?;
        Ok(Self {
            id,
            country,
            country_name,
            base_url,
            client,
            retry: config.retry.clone(),
        })
    }

    fn search_request(
        &self,
        params: &SearchParams,
    ) -> Result<reqwest::RequestBuilder, MarketplaceError> {
        let url = endpoint(&self.id, &self.base_url, &format!("sites/{}/search", self.id))?;
        let limit = params.page_size().min(MAX_LIMIT);
        let mut query: Vec<(&str, String)> = vec![
            ("q", params.query().to_owned()),
            ("limit", limit.to_string()),
            ("offset", params.offset_for(limit).to_string()),
        ];
        if let Some(sort) = sort_param(params.sort()) {
            query.push(("sort", sort.to_owned()));
        }
        if let Some(range) = price_range(params.min_price(), params.max_price()) {
            query.push(("price", range));
        }
        Ok(self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query))
    }

    fn parse_page(&self, response: SearchResponse) -> SearchPage {
        let products = response
            .results
            .into_iter()
            .filter_map(|raw| {
                let item_id = raw
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_owned();
                match serde_json::from_value::<Item>(raw)
                    .map_err(|e| e.to_string())
                    .and_then(|item| self.to_product(item))
                {
                    Ok(product) => Some(product),
                    Err(err) => {
                        tracing::warn!(
                            marketplace = %self.id,
                            item = %item_id,
                            error = %err,
                            "skipping unparseable item"
                        );
                        None
                    }
                }
            })
            .collect();
        let paging = response.paging;
        SearchPage {
            products,
            total_count: paging.total,
            has_more: paging.offset.saturating_add(paging.limit) < paging.total,
        }
    }

    fn to_product(&self, item: Item) -> Result<ProductResult, String> {
        let price = item.price.ok_or("missing price")?;
        let currency = CurrencyCode::parse(&item.currency_id).map_err(|e| e.to_string())?;
        let mut product = ProductResult::new(
            self.id.clone(),
            item.id,
            item.title,
            Money::new(price, currency.clone()),
            item.permalink,
        );
        product.condition = parse_condition(item.condition.as_deref());
        product.available_quantity = item.available_quantity;
        product.listed_at = item.date_created;
        if let Some(image) = item
            .thumbnail
            .or_else(|| item.pictures.into_iter().next().map(|p| p.url))
        {
            product = product.with_image_url(image);
        }
        if item.shipping.is_some_and(|s| s.free_shipping) {
            product = product.with_shipping(Money::new(Decimal::ZERO, currency));
        }
        if let Some(seller) = item.seller {
            let rating = seller.rating();
            product.seller_name = seller.nickname;
            if let Some(rating) = rating {
                product = product.with_seller_rating(rating);
            }
        }
        Ok(product)
    }
}

#[async_trait]
impl MarketplaceAdapter for MercadoLibreAdapter {
    fn marketplace_id(&self) -> &MarketplaceId {
        &self.id
    }

    fn display_name(&self) -> String {
        format!("MercadoLibre {}", self.country_name)
    }

    fn origin_country(&self) -> CountryCode {
        self.country.clone()
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchPage, MarketplaceError> {
        let response: SearchResponse = run_with_retry(&self.retry, &self.id, || async {
            send_json(&self.id, self.search_request(params)?).await
        })
        .await?;
        Ok(self.parse_page(response))
    }

    async fn get_product(&self, external_id: &str) -> Result<ProductResult, MarketplaceError> {
        let url = item_endpoint(&self.id, &self.base_url, "items", external_id)?;
        let item: Item = run_with_retry(&self.retry, &self.id, || {
            send_json(&self.id, self.client.get(url.clone()))
        })
        .await?;
        self.to_product(item)
            .map_err(|e| MarketplaceError::invalid_response(self.id.clone(), e))
    }

    async fn healthcheck(&self) -> bool {
        let Ok(url) = endpoint(&self.id, &self.base_url, &format!("sites/{}", self.id)) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(marketplace = %self.id, error = %err, "healthcheck failed");
                false
            }
        }
    }
}

fn sort_param(sort: SortStrategy) -> Option<&'static str> {
    match sort {
        SortStrategy::Relevance => None,
        SortStrategy::PriceAsc => Some("price_asc"),
        SortStrategy::PriceDesc => Some("price_desc"),
        SortStrategy::Newest => Some("date_desc"),
        SortStrategy::BestSeller => Some("sold_quantity_desc"),
    }
}

/// `min-max`, `min-*` or `*-max`.
fn price_range(min: Option<Decimal>, max: Option<Decimal>) -> Option<String> {
    match (min, max) {
        (None, None) => None,
        (Some(min), Some(max)) => Some(format!("{min}-{max}")),
        (Some(min), None) => Some(format!("{min}-*")),
        (None, Some(max)) => Some(format!("*-{max}")),
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    limit: u64,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: String,
    title: String,
    price: Option<Decimal>,
    currency_id: String,
    permalink: String,
    thumbnail: Option<String>,
    #[serde(default)]
    pictures: Vec<Picture>,
    condition: Option<String>,
    available_quantity: Option<u32>,
    shipping: Option<Shipping>,
    seller: Option<Seller>,
    date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Picture {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Shipping {
    #[serde(default)]
    free_shipping: bool,
}

#[derive(Debug, Deserialize)]
struct Seller {
    nickname: Option<String>,
    seller_reputation: Option<Reputation>,
}

#[derive(Debug, Deserialize)]
struct Reputation {
    transactions: Option<Transactions>,
}

#[derive(Debug, Deserialize)]
struct Transactions {
    ratings: Option<Ratings>,
}

#[derive(Debug, Deserialize)]
struct Ratings {
    #[serde(default)]
    positive: f64,
    #[serde(default)]
    negative: f64,
    #[serde(default)]
    neutral: f64,
}

impl Seller {
    /// Positive share of ratings on a 0–5 scale.
    fn rating(&self) -> Option<f64> {
        let ratings = self.seller_reputation.as_ref()?.transactions.as_ref()?.ratings.as_ref()?;
        let total = ratings.positive + ratings.negative + ratings.neutral;
        (total > 0.0).then(|| ratings.positive / total * 5.0)
    }
}
