//! Configuration loaded from `config/default.toml`.
//!
//! Reads the `[store]` and `[log]` sections. A missing file, a missing
//! section or a missing key falls back to the defaults below; a file that
//! exists but does not parse is an error. `SKILLBASE_DB` overrides the
//! database path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use skillbase_store::id_gen::DEFAULT_MAX_ATTEMPTS;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable overriding `store.path`.
pub const DB_PATH_ENV: &str = "SKILLBASE_DB";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Settings from the `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
    pub busy_timeout_ms: u32,
    /// Colliding id candidates tolerated before `add` gives up.
    pub max_id_attempts: u32,
    /// Rows per page when `list` is called without `--per-page`.
    pub page_size: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/skillbase.db"),
            busy_timeout_ms: 5_000,
            max_id_attempts: DEFAULT_MAX_ATTEMPTS,
            page_size: 20,
        }
    }
}

/// Settings from the `[log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        if let Ok(db) = std::env::var(DB_PATH_ENV)
            && !db.is_empty()
        {
            config.store.path = PathBuf::from(db);
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
