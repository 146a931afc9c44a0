//! End-to-end wiring: config → adapters → orchestrator, against mock
//! marketplace servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pricewise::{App, PricewiseConfig, PricewiseError, SearchRequest};
use pricewise_search::{CancellationToken, MarketplaceId, OrchestratorError, SortStrategy};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, sites: &[&str]) -> PricewiseConfig {
    let mut config = PricewiseConfig::default();
    config.mercadolibre.base_url = server.uri();
    config.mercadolibre.sites = sites.iter().map(|s| (*s).to_owned()).collect();
    config.search.default_marketplaces.clear();
    config.search.cache_ttl_secs = 0;
    config.retry.max_attempts = 1;
    config
}

fn item(id: &str, price: u64, currency: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Item {id}"),
        "price": price,
        "currency_id": currency,
        "permalink": format!("https://articulo.mercadolibre.com/{id}"),
        "shipping": {"free_shipping": true}
    })
}

async fn mount_search(server: &MockServer, site: &str, results: Vec<serde_json::Value>) {
    let total = results.len();
    Mock::given(method("GET"))
        .and(path(format!("/sites/{site}/search")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "paging": {"total": total, "offset": 0, "limit": 20},
            "results": results
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn search_across_sites_with_tax() {
    let server = MockServer::start().await;
    // 30000 CLP ≈ 33 USD, domestic for a Chilean buyer.
    mount_search(&server, "MLC", vec![item("MLC1", 30_000, "CLP")]).await;
    // 20 USD listed in Argentina, imported into Chile under the de minimis.
    mount_search(&server, "MLA", vec![item("MLA1", 20, "USD")]).await;

    let app = App::from_config(config_for(&server, &["MLC", "MLA"])).expect("app");
    let result = app
        .search(
            SearchRequest {
                query: "termo".into(),
                country: Some("CL".into()),
                sort: SortStrategy::PriceAsc,
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .expect("search");

    let ids: Vec<&str> = result
        .items
        .iter()
        .map(|i| i.product.external_id.as_str())
        .collect();
    assert_eq!(ids, vec!["MLA1", "MLC1"]);
    assert!(result.items[0].best_price);
    let import = result.items[0].tax.as_ref().expect("tax");
    assert!(import.de_minimis_exempt);
    assert!(!import.domestic);
    assert!(result.items[1].tax.as_ref().expect("tax").domestic);
    assert_eq!(result.total_count, 2);
}

#[tokio::test]
async fn one_site_down_is_partial() {
    let server = MockServer::start().await;
    mount_search(&server, "MLC", vec![item("MLC1", 1_000, "CLP")]).await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/search"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let app = App::from_config(config_for(&server, &["MLC", "MLM"])).expect("app");
    let result = app
        .search(
            SearchRequest {
                query: "taza".into(),
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .expect("partial");
    assert_eq!(result.items.len(), 1);
    assert!(result.failures.contains_key(&MarketplaceId::parse("MLM").expect("id")));
}

#[tokio::test]
async fn every_site_down_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = App::from_config(config_for(&server, &["MLC"])).expect("app");
    let err = app
        .search(
            SearchRequest {
                query: "taza".into(),
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PricewiseError::Search(OrchestratorError::AllBackendsFailed { .. })
    ));
}

#[tokio::test]
async fn product_lookup_and_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/MLC77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item("MLC77", 5_000, "CLP")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/MLC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "MLC"})))
        .mount(&server)
        .await;

    let app = App::from_config(config_for(&server, &["MLC"])).expect("app");
    let product = app.product("mlc", "MLC77").await.expect("product");
    assert_eq!(product.title, "Item MLC77");

    let health = app.orchestrator().healthcheck().await;
    assert_eq!(health.get(&MarketplaceId::parse("MLC").expect("id")), Some(&true));

    let err = app.product("EBAY_US", "1").await.unwrap_err();
    assert!(matches!(
        err,
        PricewiseError::Search(OrchestratorError::UnknownMarketplace(_))
    ));
}

#[tokio::test]
async fn paging_forwarded_to_marketplace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/MLC/search"))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "paging": {"total": 100, "offset": 10, "limit": 5},
            "results": [item("MLC11", 100, "CLP")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = App::from_config(config_for(&server, &["MLC"])).expect("app");
    let result = app
        .search(
            SearchRequest {
                query: "libro".into(),
                page: Some(3),
                page_size: Some(5),
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .expect("search");
    assert!(result.has_more);
    assert_eq!(result.total_count, 100);
}
