//! Error types for the pricewise host.

use pricewise_search::{OrchestratorError, TaxError};

/// Top-level error type for the host layer.
#[derive(Debug, thiserror::Error)]
pub enum PricewiseError {
    /// Configuration file could not be parsed, serialized or validated.
    #[error("config error: {0}")]
    Config(String),

    /// Search or adapter wiring error.
    #[error("search error: {0}")]
    Search(#[from] OrchestratorError),

    /// Tax table could not be loaded.
    #[error("tax error: {0}")]
    Tax(#[from] TaxError),

    /// Logging could not be initialised.
    #[error("logging error: {0}")]
    Logging(String),

    /// Output could not be rendered.
    #[error("output error: {0}")]
    Output(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PricewiseError>;
