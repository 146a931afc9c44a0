//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/pricewise/` | `~/.config/pricewise/` |
//! | Data (logs) | `~/Library/Application Support/pricewise/` | `~/.local/share/pricewise/` |
//!
//! `PRICEWISE_CONFIG_DIR` and `PRICEWISE_DATA_DIR` override the defaults.

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PRICEWISE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("pricewise"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pricewise-config"))
}

/// Application data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PRICEWISE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("pricewise"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pricewise-data"))
}

/// Default log directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default configuration file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
