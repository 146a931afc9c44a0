//! Orchestrator configuration with sensible defaults.
//!
//! [`OrchestratorConfig`] controls the shared deadline, health check timeout
//! and result caching. It is passed at construction; nothing is read from
//! global state.

use std::time::Duration;

use crate::error::OrchestratorError;

/// Configuration for a [`crate::Orchestrator`].
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Shared deadline for one search fan-out. Marketplaces still pending
    /// when it elapses are reported as timed out.
    pub deadline: Duration,
    /// Upper bound for each adapter's healthcheck.
    pub health_timeout: Duration,
    /// How long aggregated results stay cached. Zero disables caching.
    pub cache_ttl: Duration,
    /// Maximum number of cached aggregated results.
    pub cache_capacity: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            health_timeout: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(120),
            cache_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `deadline` must be greater than 0
    /// - `health_timeout` must be greater than 0
    /// - `cache_capacity` must be greater than 0 when caching is enabled
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.deadline.is_zero() {
            return Err(OrchestratorError::Config(
                "deadline must be greater than 0".into(),
            ));
        }
        if self.health_timeout.is_zero() {
            return Err(OrchestratorError::Config(
                "health_timeout must be greater than 0".into(),
            ));
        }
        if self.caching_enabled() && self.cache_capacity == 0 {
            return Err(OrchestratorError::Config(
                "cache_capacity must be greater than 0 when caching is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }
}
