//! Tracing setup for the `pricewise` binary.
//!
//! Everything goes to stderr so stdout stays clean JSON. With
//! `logging.directory` set, a daily rolling file is written as well.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{PricewiseError, Result};

/// Log file name prefix inside `logging.directory`.
pub const LOG_FILE_PREFIX: &str = "pricewise.log";

/// Keeps the file writer flushing. Drop it only at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` when set, otherwise the configured filter.
///
/// # Errors
///
/// Returns [`PricewiseError::Logging`] for an unparseable configured filter.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            PricewiseError::Logging(format!("invalid filter {:?}: {e}", config.filter))
        }),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the filter is invalid, the log directory cannot be created, or
/// a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let filter = env_filter(config)?;

    let (file_layer, file_guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| PricewiseError::Logging(e.to_string()))?;

    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "pricewise=notalevel".into(),
            directory: None,
        };
        assert!(matches!(env_filter(&config), Err(PricewiseError::Logging(_))));
    }

    #[test]
    fn default_filter_parses() {
        assert!(env_filter(&LoggingConfig::default()).is_ok());
    }
}
