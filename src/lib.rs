//! # pricewise
//!
//! Host layer around [`pricewise_search`]: a TOML configuration file,
//! logging setup, and wiring of the bundled MercadoLibre and eBay adapters
//! into an orchestrator. The `pricewise` binary exposes it as a CLI.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod paths;

pub use app::{App, SearchRequest};
pub use config::PricewiseConfig;
pub use error::{PricewiseError, Result};
