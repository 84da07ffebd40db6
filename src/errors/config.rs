// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::errors::StorageError;

/// Errors raised while loading configuration or assembling the runtime from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for [`crate::config::Config`]
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field holds a value the runtime cannot work with
    #[error("Invalid configuration value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },

    /// The requested storage backend was not compiled into this build
    #[error("Storage backend '{backend}' is not available in this build (enable the '{backend}' feature)")]
    BackendUnavailable { backend: String },

    /// The store could not be opened
    #[error("Failed to open provenance store: {0}")]
    Storage(#[from] StorageError),
}
