//! Bundled marketplace adapters.
//!
//! Each submodule implements [`crate::MarketplaceAdapter`] for one family of
//! public marketplace APIs. The orchestrator never names these types; hosts
//! construct them from configuration and register them.

pub mod ebay;
pub mod mercadolibre;

pub use ebay::{EbayAdapter, EbayAuth, EbayConfig, EBAY_MARKETPLACES};
pub use mercadolibre::{MercadoLibreAdapter, MercadoLibreConfig, MELI_SITES};

use url::Url;

use crate::error::{MarketplaceError, OrchestratorError};
use crate::types::{Condition, MarketplaceId};

/// Parse a configured base URL, making sure relative joins keep its path.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, OrchestratorError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash)
        .map_err(|e| OrchestratorError::Config(format!("invalid base url {raw:?}: {e}")))
}

/// Join `path` (no leading slash) onto `base`.
pub(crate) fn endpoint(
    marketplace: &MarketplaceId,
    base: &Url,
    path: &str,
) -> Result<Url, MarketplaceError> {
    base.join(path).map_err(|e| {
        MarketplaceError::invalid_response(marketplace.clone(), format!("bad endpoint {path}: {e}"))
    })
}

/// `base/collection/<id>`, with `id` percent-encoded as a single path segment.
pub(crate) fn item_endpoint(
    marketplace: &MarketplaceId,
    base: &Url,
    collection: &str,
    id: &str,
) -> Result<Url, MarketplaceError> {
    let mut url = endpoint(marketplace, base, collection)?;
    url.path_segments_mut()
        .map_err(|()| {
            MarketplaceError::invalid_response(marketplace.clone(), "base url cannot hold a path")
        })?
        .pop_if_empty()
        .push(id);
    Ok(url)
}

/// Map a free-text condition label onto [`Condition`].
pub(crate) fn parse_condition(label: Option<&str>) -> Condition {
    let Some(label) = label else {
        return Condition::Unknown;
    };
    let lower = label.trim().to_ascii_lowercase();
    if lower.contains("refurbished") {
        Condition::Refurbished
    } else if lower.starts_with("new") {
        Condition::New
    } else if lower.is_empty() {
        Condition::Unknown
    } else if ["used", "pre-owned", "good", "very good", "excellent", "acceptable", "for parts"]
        .iter()
        .any(|l| lower.starts_with(l))
    {
        Condition::Used
    } else {
        Condition::Unknown
    }
}
