// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS};
use crate::errors::ConfigError;
use crate::lineage::LineageOptions;
use crate::recorder::RecorderOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for the provenance runtime.
///
/// Every section is optional; an empty file yields an in-memory store with
/// boundary reconciliation enabled.
///
/// # Fields
/// * `storage` - Which provenance store to open
/// * `recorder` - Event recorder switches
/// * `lineage` - Lineage resolver switches
/// * `logging` - Log filter used by the binary
///
/// # Example
/// ```yaml
/// storage:
///   backend: sqlite
///   path: lineage.db
///   max_connections: 4
/// recorder:
///   reconcile_boundaries: true
///   persist_depths: true
/// lineage:
///   return_inputs: true
///   build_opm: false
/// logging:
///   filter: "dagwood_lineage=debug"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recorder: RecorderOptions,
    #[serde(default)]
    pub lineage: LineageOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend for provenance rows.
///
/// # Variants
/// * `Memory` - DashMap tables living as long as the process
/// * `Sqlite` - SQLite database file (requires the `sqlite` feature)
#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Storage configuration.
///
/// # Fields
/// * `backend` - Backend to open (defaults to `memory`)
/// * `path` - Database file, required for `sqlite`
/// * `max_connections` - Connection pool size (defaults to 5)
#[derive(Debug, Default, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
    pub max_connections: Option<u32>,
}

impl StorageConfig {
    /// Get the pool size, using the built-in default if not configured.
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a config from YAML text; empty text yields the defaults
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Load and validate a config from a YAML file
///
/// This function loads the configuration and checks that the storage section
/// can be satisfied by this build.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Check the values serde cannot check
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.storage.max_connections == Some(0) {
        return Err(ConfigError::Invalid {
            field: "storage.max_connections",
            message: "must be at least 1".to_string(),
        });
    }

    if cfg.storage.backend == StorageBackend::Sqlite {
        if !cfg!(feature = "sqlite") {
            return Err(ConfigError::BackendUnavailable {
                backend: "sqlite".to_string(),
            });
        }
        if cfg.storage.path.is_none() {
            return Err(ConfigError::Invalid {
                field: "storage.path",
                message: "the sqlite backend needs a database path".to_string(),
            });
        }
    }

    Ok(())
}
