//! Error types for the pricewise-search crate.
//!
//! Marketplace and tax errors are recoverable at the orchestrator level and
//! end up recorded in the aggregated result. Only [`OrchestratorError`] is
//! surfaced to callers as a failure of the whole operation. No credentials or
//! raw response bodies appear in error messages.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CountryCode, MarketplaceId};

/// Category of a marketplace failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceErrorKind {
    /// The backend did not answer within its own budget or the
    /// orchestrator deadline.
    Timeout,
    /// The backend rejected the request because of rate limiting.
    RateLimited,
    /// Credentials were rejected or a token could not be obtained.
    AuthFailed,
    /// The backend could not be reached, or no adapter is registered for it.
    Unreachable,
    /// The backend answered with something that could not be understood.
    InvalidResponse,
    /// The requested product does not exist. Only produced by product lookups.
    NotFound,
}

impl MarketplaceErrorKind {
    /// Stable snake_case name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::AuthFailed => "auth_failed",
            Self::Unreachable => "unreachable",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
        }
    }

    /// Whether a failure of this kind may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Unreachable)
    }
}

impl fmt::Display for MarketplaceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by (or on behalf of) one marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{marketplace}] {kind}: {message}")]
pub struct MarketplaceError {
    /// What went wrong.
    pub kind: MarketplaceErrorKind,
    /// The marketplace that failed.
    pub marketplace: MarketplaceId,
    /// Whether retrying could help. Derived from `kind` at construction.
    pub retryable: bool,
    /// Human-readable detail.
    pub message: String,
    /// Backend-supplied hint for when to retry, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl MarketplaceError {
    /// Create an error of the given kind for `marketplace`.
    pub fn new(
        kind: MarketplaceErrorKind,
        marketplace: MarketplaceId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            marketplace,
            retryable: kind.is_retryable(),
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// Attach a retry-after hint (typically from a `Retry-After` header).
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_secs = Some(retry_after.as_secs());
        self
    }

    /// The retry-after hint as a [`Duration`], if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_secs.map(Duration::from_secs)
    }

    pub fn timeout(marketplace: MarketplaceId, message: impl Into<String>) -> Self {
        Self::new(MarketplaceErrorKind::Timeout, marketplace, message)
    }

    pub fn unreachable(marketplace: MarketplaceId, message: impl Into<String>) -> Self {
        Self::new(MarketplaceErrorKind::Unreachable, marketplace, message)
    }

    pub fn invalid_response(marketplace: MarketplaceId, message: impl Into<String>) -> Self {
        Self::new(MarketplaceErrorKind::InvalidResponse, marketplace, message)
    }

    pub fn auth_failed(marketplace: MarketplaceId, message: impl Into<String>) -> Self {
        Self::new(MarketplaceErrorKind::AuthFailed, marketplace, message)
    }

    pub fn rate_limited(marketplace: MarketplaceId, message: impl Into<String>) -> Self {
        Self::new(MarketplaceErrorKind::RateLimited, marketplace, message)
    }
}

/// Fatal errors of a search operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    /// Every requested marketplace failed. Carries the full failure map.
    #[error("all marketplaces failed: {}", summarize(.failures))]
    AllBackendsFailed {
        failures: BTreeMap<MarketplaceId, MarketplaceError>,
    },

    /// The request was malformed.
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the operation before it completed.
    #[error("search cancelled by caller")]
    Cancelled,

    /// A single-marketplace operation named a marketplace with no adapter.
    #[error("no adapter registered for marketplace {0}")]
    UnknownMarketplace(MarketplaceId),

    /// A single-marketplace operation failed.
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    /// Invalid orchestrator configuration.
    #[error("config error: {0}")]
    Config(String),
}

fn summarize(failures: &BTreeMap<MarketplaceId, MarketplaceError>) -> String {
    if failures.is_empty() {
        return "no marketplaces requested".into();
    }
    failures
        .iter()
        .map(|(id, err)| format!("{id}: {}", err.kind))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Recoverable tax estimation failures. The orchestrator degrades the
/// affected item's tax to absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaxError {
    /// No tax profile is configured for the destination.
    #[error("no tax profile for destination {0}")]
    UnknownDestination(CountryCode),

    /// An amount cannot be taxed (negative, mixed currency, no exchange rate).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A tax table could not be loaded.
    #[error("tax table error: {0}")]
    Table(String),
}

/// Adapter registry lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no adapter registered for marketplace {0}")]
    NotFound(MarketplaceId),
}

/// Result cache write failures. Never fatal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache write failed: {0}")]
    Write(String),
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn mid(id: &str) -> MarketplaceId {
        MarketplaceId::parse(id).expect("valid id")
    }

    #[test]
    fn retryable_flag_follows_kind() {
        let m = mid("MLC");
        assert!(MarketplaceError::timeout(m.clone(), "slow").retryable);
        assert!(MarketplaceError::rate_limited(m.clone(), "429").retryable);
        assert!(MarketplaceError::unreachable(m.clone(), "dns").retryable);
        assert!(!MarketplaceError::auth_failed(m.clone(), "401").retryable);
        assert!(!MarketplaceError::invalid_response(m.clone(), "json").retryable);
        assert!(!MarketplaceError::new(MarketplaceErrorKind::NotFound, m, "gone").retryable);
    }

    #[test]
    fn display_marketplace_error() {
        let err = MarketplaceError::timeout(mid("EBAY_US"), "deadline elapsed");
        assert_eq!(err.to_string(), "[EBAY_US] timeout: deadline elapsed");
    }

    #[test]
    fn retry_after_round_trips_through_seconds() {
        let err = MarketplaceError::rate_limited(mid("MLA"), "slow down")
            .with_retry_after(Duration::from_secs(30));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn display_all_backends_failed_lists_every_marketplace() {
        let mut failures = BTreeMap::new();
        failures.insert(mid("B"), MarketplaceError::timeout(mid("B"), "x"));
        failures.insert(mid("A"), MarketplaceError::auth_failed(mid("A"), "y"));
        let err = OrchestratorError::AllBackendsFailed { failures };
        assert_eq!(
            err.to_string(),
            "all marketplaces failed: A: auth_failed; B: timeout"
        );
    }

    #[test]
    fn display_invalid_request() {
        let err = OrchestratorError::InvalidRequest("query must not be empty".into());
        assert_eq!(
            err.to_string(),
            "invalid search request: query must not be empty"
        );
    }

    #[test]
    fn display_unknown_destination() {
        let err = TaxError::UnknownDestination(CountryCode::parse("NZ").expect("valid"));
        assert_eq!(err.to_string(), "no tax profile for destination NZ");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&MarketplaceErrorKind::RateLimited).expect("serialize");
        assert_eq!(json, "\"rate_limited\"");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MarketplaceError>();
        assert_send_sync::<OrchestratorError>();
        assert_send_sync::<TaxError>();
    }
}
