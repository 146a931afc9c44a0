//! eBay Browse API.
//!
//! Authenticates with an OAuth client-credentials token that is cached
//! until shortly before it expires and shared between every eBay
//! marketplace adapter built from the same [`EbayAuth`]. A 401 from the
//! Browse API drops the cached token and retries once with a fresh one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use super::{endpoint, item_endpoint, parse_base_url, parse_condition};
use crate::adapter::MarketplaceAdapter;
use crate::error::{MarketplaceError, MarketplaceErrorKind, OrchestratorError};
use crate::http::{build_client, send_json};
use crate::params::SearchParams;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::types::{
    CountryCode, CurrencyCode, MarketplaceId, Money, ProductResult, SearchPage, SortStrategy,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.ebay.com";

/// OAuth scope for public Browse API access.
pub const API_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// Largest page the search endpoint serves.
pub const MAX_LIMIT: u32 = 200;

const NO_QUERY: &[(&str, String)] = &[];

/// Tokens are refreshed this long before the expiry eBay reports.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supported marketplaces: (id, country, currency, display name).
pub const EBAY_MARKETPLACES: &[(&str, &str, &str, &str)] = &[
    ("EBAY_US", "US", "USD", "eBay United States"),
    ("EBAY_GB", "GB", "GBP", "eBay United Kingdom"),
    ("EBAY_DE", "DE", "EUR", "eBay Germany"),
    ("EBAY_AU", "AU", "AUD", "eBay Australia"),
    ("EBAY_CA", "CA", "CAD", "eBay Canada"),
    ("EBAY_FR", "FR", "EUR", "eBay France"),
    ("EBAY_IT", "IT", "EUR", "eBay Italy"),
    ("EBAY_ES", "ES", "EUR", "eBay Spain"),
];

/// Settings for eBay adapters.
#[derive(Clone)]
pub struct EbayConfig {
    pub app_id: String,
    pub cert_id: String,
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for EbayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbayConfig")
            .field("app_id", &self.app_id)
            .field("cert_id", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl EbayConfig {
    pub fn new(app_id: impl Into<String>, cert_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            cert_id: cert_id.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(4),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Client-credentials token source shared by eBay adapters.
pub struct EbayAuth {
    credentials: String,
    token_url: Url,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for EbayAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbayAuth")
            .field("token_url", &self.token_url.as_str())
            .finish_non_exhaustive()
    }
}

impl EbayAuth {
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] for empty credentials or a bad
    /// base URL.
    pub fn new(config: &EbayConfig) -> Result<Self, OrchestratorError> {
        if config.app_id.trim().is_empty() || config.cert_id.trim().is_empty() {
            return Err(OrchestratorError::Config(
                "eBay app_id and cert_id must be set".into(),
            ));
        }
        let base = parse_base_url(&config.base_url)?;
        let token_url = base
            .join("identity/v1/oauth2/token")
            .map_err(|e| OrchestratorError::Config(format!("invalid eBay token url: {e}")))?;
        let auth_id = MarketplaceId::parse("EBAY")?;
        Ok(Self {
            credentials: BASE64.encode(format!("{}:{}", config.app_id, config.cert_id)),
            token_url,
            client: build_client(&auth_id, config.timeout)?,
            cached: Mutex::new(None),
        })
    }

    /// Return a valid access token, fetching a new one if needed.
    async fn token(&self, marketplace: &MarketplaceId) -> Result<String, MarketplaceError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let request = self
            .client
            .post(self.token_url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.credentials))
            .form(&[("grant_type", "client_credentials"), ("scope", API_SCOPE)]);
        let response: TokenResponse = send_json(marketplace, request).await.map_err(|err| {
            if err.kind == MarketplaceErrorKind::AuthFailed
                || err.kind == MarketplaceErrorKind::InvalidResponse
            {
                MarketplaceError::auth_failed(marketplace.clone(), "could not obtain access token")
            } else {
                err
            }
        })?;

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(7200));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);
        tracing::info!(expires_in = lifetime.as_secs(), "eBay access token obtained");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at,
        });
        Ok(response.access_token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Adapter for one eBay marketplace.
#[derive(Debug, Clone)]
pub struct EbayAdapter {
    id: MarketplaceId,
    country: CountryCode,
    currency: CurrencyCode,
    name: &'static str,
    browse_url: Url,
    client: reqwest::Client,
    auth: Arc<EbayAuth>,
    retry: RetryPolicy,
}

impl EbayAdapter {
    /// Create an adapter for `marketplace` (e.g. `EBAY_US`).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] for an unknown marketplace or a
    /// bad base URL.
    pub fn new(
        marketplace: &str,
        config: &EbayConfig,
        auth: Arc<EbayAuth>,
    ) -> Result<Self, OrchestratorError> {
        let id = MarketplaceId::parse(marketplace)?;
        let &(_, country, currency, name) = EBAY_MARKETPLACES
            .iter()
            .find(|(m, _, _, _)| *m == id.as_str())
            .ok_or_else(|| OrchestratorError::Config(format!("unknown eBay marketplace {id}")))?;
        let browse_url = parse_base_url(&config.base_url)?
            .join("buy/browse/v1/")
            .map_err(|e| OrchestratorError::Config(format!("invalid eBay browse url: {e}")))?;
        Ok(Self {
            country: CountryCode::parse(country)?,
            currency: CurrencyCode::parse(currency)?,
            name,
            browse_url,
            client: build_client(&id, config.timeout)?,
            auth,
            retry: config.retry.clone(),
            id,
        })
    }

    /// Authenticated GET with one token refresh on 401.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T, MarketplaceError> {
        let mut refreshed = false;
        loop {
            let token = self.auth.token(&self.id).await?;
            let request = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .header("X-EBAY-C-MARKETPLACE-ID", self.id.as_str())
                .header(reqwest::header::ACCEPT, "application/json")
                .query(query);
            match send_json(&self.id, request).await {
                Err(err) if err.kind == MarketplaceErrorKind::AuthFailed && !refreshed => {
                    tracing::debug!(marketplace = %self.id, "access token rejected, refreshing");
                    self.auth.invalidate().await;
                    refreshed = true;
                }
                other => return other,
            }
        }
    }

    fn search_query(&self, params: &SearchParams) -> Vec<(&'static str, String)> {
        let limit = params.page_size().min(MAX_LIMIT);
        let mut query = vec![
            ("q", params.query().to_owned()),
            ("limit", limit.to_string()),
            ("offset", params.offset_for(limit).to_string()),
        ];
        if let Some(sort) = sort_param(params.sort()) {
            query.push(("sort", sort.to_owned()));
        }
        if let Some(range) = price_filter(params.min_price(), params.max_price()) {
            query.push(("filter", format!("{range},priceCurrency:{}", self.currency)));
        }
        query
    }

    fn parse_page(&self, response: SearchResponse) -> SearchPage {
        let products = response
            .item_summaries
            .into_iter()
            .filter_map(|raw| {
                let item_id = raw
                    .get("itemId")
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
        let reported_more = response.offset.saturating_add(response.limit) < response.total;
        SearchPage {
            products,
            total_count: response.total,
            has_more: response.next.is_some() || reported_more,
        }
    }

    fn to_product(&self, item: Item) -> Result<ProductResult, String> {
        let price = item.price.to_money()?;
        let mut product =
            ProductResult::new(self.id.clone(), item.item_id, item.title, price, item.item_web_url);
        product.condition = parse_condition(item.condition.as_deref());
        product.listed_at = item.item_creation_date;
        if let Some(image) = item.image.and_then(|i| i.image_url) {
            product = product.with_image_url(image);
        }
        if let Some(cost) = item
            .shipping_options
            .into_iter()
            .next()
            .and_then(|o| o.shipping_cost)
        {
            product = product.with_shipping(cost.to_money()?);
        }
        if let Some(seller) = item.seller {
            product.seller_name = seller.username;
            let percentage = seller
                .feedback_percentage
                .as_deref()
                .and_then(|p| p.trim().parse::<f64>().ok());
            if let Some(pct) = percentage {
                product = product.with_seller_rating(pct / 20.0);
            }
        }
        Ok(product)
    }
}

#[async_trait]
impl MarketplaceAdapter for EbayAdapter {
    fn marketplace_id(&self) -> &MarketplaceId {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.to_owned()
    }

    fn origin_country(&self) -> CountryCode {
        self.country.clone()
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchPage, MarketplaceError> {
        let url = endpoint(&self.id, &self.browse_url, "item_summary/search")?;
        let query = self.search_query(params);
        let response: SearchResponse =
            run_with_retry(&self.retry, &self.id, || self.get_json(&url, &query)).await?;
        Ok(self.parse_page(response))
    }

    async fn get_product(&self, external_id: &str) -> Result<ProductResult, MarketplaceError> {
        let url = item_endpoint(&self.id, &self.browse_url, "item", external_id)?;
        let item: Item =
            run_with_retry(&self.retry, &self.id, || self.get_json(&url, NO_QUERY)).await?;
        self.to_product(item)
            .map_err(|e| MarketplaceError::invalid_response(self.id.clone(), e))
    }

    async fn healthcheck(&self) -> bool {
        match self.auth.token(&self.id).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(marketplace = %self.id, error = %err, "healthcheck failed");
                false
            }
        }
    }
}

fn sort_param(sort: SortStrategy) -> Option<&'static str> {
    match sort {
        SortStrategy::Relevance | SortStrategy::BestSeller => None,
        SortStrategy::PriceAsc => Some("price"),
        SortStrategy::PriceDesc => Some("-price"),
        SortStrategy::Newest => Some("newlyListed"),
    }
}

/// `price:[min..max]` with open ends left blank.
fn price_filter(min: Option<Decimal>, max: Option<Decimal>) -> Option<String> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let min = min.map(|d| d.to_string()).unwrap_or_default();
    let max = max.map(|d| d.to_string()).unwrap_or_default();
    Some(format!("price:[{min}..{max}]"))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    limit: u64,
    next: Option<String>,
    #[serde(default)]
    item_summaries: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    item_id: String,
    title: String,
    price: Amount,
    item_web_url: String,
    image: Option<Image>,
    #[serde(default)]
    shipping_options: Vec<ShippingOption>,
    seller: Option<Seller>,
    condition: Option<String>,
    item_creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: Decimal,
    currency: String,
}

impl Amount {
    fn to_money(&self) -> Result<Money, String> {
        let currency = CurrencyCode::parse(&self.currency).map_err(|e| e.to_string())?;
        Ok(Money::new(self.value, currency))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShippingOption {
    shipping_cost: Option<Amount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Seller {
    username: Option<String>,
    feedback_percentage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> EbayConfig {
        EbayConfig::new("app", "cert")
    }

    fn adapter(marketplace: &str) -> EbayAdapter {
        let auth = Arc::new(EbayAuth::new(&config()).expect("auth"));
        EbayAdapter::new(marketplace, &config(), auth).expect("adapter")
    }

    #[test]
    fn empty_credentials_rejected() {
        let err = EbayAuth::new(&EbayConfig::new("", "cert")).unwrap_err();
        assert!(err.to_string().contains("app_id"));
    }

    #[test]
    fn debug_redacts_cert_id() {
        let rendered = format!("{:?}", EbayConfig::new("app", "super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn unknown_marketplace_rejected() {
        let auth = Arc::new(EbayAuth::new(&config()).expect("auth"));
        assert!(EbayAdapter::new("EBAY_XX", &config(), auth).is_err());
    }

    #[test]
    fn marketplace_metadata() {
        let de = adapter("EBAY_DE");
        assert_eq!(de.origin_country().as_str(), "DE");
        assert_eq!(de.display_name(), "eBay Germany");
    }

    #[test]
    fn price_filter_formats() {
        assert_eq!(price_filter(None, None), None);
        assert_eq!(
            price_filter(Some(dec!(10)), Some(dec!(50))).as_deref(),
            Some("price:[10..50]")
        );
        assert_eq!(price_filter(None, Some(dec!(50))).as_deref(), Some("price:[..50]"));
    }

    #[test]
    fn filter_carries_marketplace_currency() {
        let params = SearchParams::builder("lamp")
            .marketplace("EBAY_GB")
            .min_price(dec!(5))
            .sort(SortStrategy::PriceDesc)
            .build()
            .expect("valid");
        let query = adapter("EBAY_GB").search_query(&params);
        assert!(query.contains(&("filter", "price:[5..],priceCurrency:GBP".to_owned())));
        assert!(query.contains(&("sort", "-price".to_owned())));
    }

    #[test]
    fn parses_summaries() {
        let body = serde_json::json!({
            "total": 3, "offset": 0, "limit": 2, "next": "https://next",
            "itemSummaries": [
                {
                    "itemId": "v1|123|0", "title": "Desk lamp",
                    "price": {"value": "24.99", "currency": "USD"},
                    "itemWebUrl": "https://www.ebay.com/itm/123",
                    "image": {"imageUrl": "https://i.ebayimg.com/1.jpg"},
                    "shippingOptions": [{"shippingCost": {"value": "5.00", "currency": "USD"}}],
                    "seller": {"username": "lamps4u", "feedbackPercentage": "99.0"},
                    "condition": "New",
                    "itemCreationDate": "2025-03-01T10:00:00.000Z"
                },
                {"itemId": "broken", "title": "No price"}
            ]
        });
        let response: SearchResponse = serde_json::from_value(body).expect("shape");
        let page = adapter("EBAY_US").parse_page(response);
        assert_eq!(page.products.len(), 1);
        assert!(page.has_more);
        let p = &page.products[0];
        assert_eq!(p.price.amount, dec!(24.99));
        assert_eq!(p.shipping.as_ref().map(|s| s.amount), Some(dec!(5.00)));
        let rating = p.seller_rating.expect("rating");
        assert!((rating - 4.95).abs() < 1e-9);
        assert!(p.listed_at.is_some());
        assert_eq!(p.condition, crate::types::Condition::New);
    }
}
