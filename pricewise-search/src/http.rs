//! Shared HTTP plumbing for marketplace adapters.
//!
//! Builds the [`reqwest::Client`] used by HTTP adapters and maps status
//! codes and transport failures onto [`MarketplaceError`] kinds so raw I/O
//! errors never leave an adapter.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::error::{MarketplaceError, MarketplaceErrorKind};
use crate::types::MarketplaceId;

/// User-Agent sent to marketplace APIs.
pub const USER_AGENT: &str = concat!("pricewise/", env!("CARGO_PKG_VERSION"));

/// Retry-after used when a 429 response carries no usable header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Build a [`reqwest::Client`] for marketplace API calls.
///
/// The client has a per-request timeout, gzip decompression and a fixed
/// User-Agent.
///
/// # Errors
///
/// Returns an `Unreachable` [`MarketplaceError`] if the client cannot be
/// constructed (for example, no TLS backend is available).
pub fn build_client(
    marketplace: &MarketplaceId,
    timeout: Duration,
) -> Result<reqwest::Client, MarketplaceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| {
            MarketplaceError::unreachable(
                marketplace.clone(),
                format!("failed to build HTTP client: {e}"),
            )
        })
}

/// Map a non-success HTTP status onto a marketplace error.
///
/// Response bodies are never included in the message.
pub fn map_status(
    marketplace: &MarketplaceId,
    status: StatusCode,
    headers: &HeaderMap,
) -> MarketplaceError {
    let kind = match status.as_u16() {
        401 | 403 => MarketplaceErrorKind::AuthFailed,
        404 => MarketplaceErrorKind::NotFound,
        408 | 504 => MarketplaceErrorKind::Timeout,
        429 => MarketplaceErrorKind::RateLimited,
        500..=599 => MarketplaceErrorKind::Unreachable,
        _ => MarketplaceErrorKind::InvalidResponse,
    };
    let err = MarketplaceError::new(kind, marketplace.clone(), format!("HTTP {status}"));
    if kind == MarketplaceErrorKind::RateLimited {
        err.with_retry_after(parse_retry_after(headers).unwrap_or(DEFAULT_RETRY_AFTER))
    } else {
        err
    }
}

/// Map a transport-level [`reqwest::Error`] onto a marketplace error.
pub fn map_transport_error(marketplace: &MarketplaceId, err: &reqwest::Error) -> MarketplaceError {
    if err.is_timeout() {
        MarketplaceError::timeout(marketplace.clone(), "request timed out")
    } else if err.is_decode() || err.is_body() {
        MarketplaceError::invalid_response(
            marketplace.clone(),
            "response body could not be decoded",
        )
    } else if let Some(status) = err.status() {
        map_status(marketplace, status, &HeaderMap::new())
    } else {
        // Drop the URL from the message: it may carry query text.
        MarketplaceError::unreachable(marketplace.clone(), describe_transport_error(err))
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a request and decode a JSON body, mapping every failure.
pub async fn send_json<T: serde::de::DeserializeOwned>(
    marketplace: &MarketplaceId,
    request: reqwest::RequestBuilder,
) -> Result<T, MarketplaceError> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport_error(marketplace, &e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(map_status(marketplace, status, response.headers()));
    }
    response.json::<T>().await.map_err(|e| {
        tracing::debug!(marketplace = %marketplace, error = %e, "failed to decode response");
        MarketplaceError::invalid_response(marketplace.clone(), "unexpected response shape")
    })
}

fn describe_transport_error(err: &reqwest::Error) -> &'static str {
    if err.is_connect() {
        "connection failed"
    } else if err.is_redirect() {
        "too many redirects"
    } else {
        "request failed"
    }
}
