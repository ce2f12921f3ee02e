//! Configuration management
//!
//! Sources, lowest priority first: built-in defaults, a config file
//! (`--config` or `./listboard.toml` if present), `LISTBOARD_*` env vars.

use crate::spamguard::SpamGuard;
use crate::storage::StorageConfig;
use config::{Config, Environment, File};
use listboard_core::{ListboardError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "listboard";
const ENV_PREFIX: &str = "LISTBOARD";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Backend selector: sqlite, postgres or memory
    pub database: String,
    /// File path or connection URL handed to the backend
    pub dsn: String,
    /// Wrap the backend in the per-domain read cache
    pub cache: bool,
    pub post_block_expire_secs: u64,
    pub items_per_page: usize,
    pub log_level: String,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("database", "sqlite")
            .and_then(|b| b.set_default("dsn", "./data/listboard.db"))
            .and_then(|b| b.set_default("cache", true))
            .and_then(|b| b.set_default("post_block_expire_secs", 30_i64))
            .and_then(|b| b.set_default("items_per_page", 100_i64))
            .and_then(|b| b.set_default("log_level", "info"))
            .map_err(config_err)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_err)
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.database, &self.dsn).cached(self.cache)
    }

    pub fn spam_guard(&self) -> SpamGuard {
        SpamGuard::new(Duration::from_secs(self.post_block_expire_secs))
    }
}

fn config_err(e: config::ConfigError) -> ListboardError {
    ListboardError::Config(e.to_string())
}
