// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::errors::SchemaError;

/// Storage layer error type for provenance stores.
///
/// Wraps the underlying driver error while keeping enough context to tell
/// a connection problem apart from a row that no longer decodes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A database operation failed.
    #[error("database operation failed: {0}")]
    Database(String),

    /// The store could not be opened or a connection could not be acquired.
    #[error("connection error: {0}")]
    Connection(String),

    /// A stored row could not be decoded into its schema type.
    #[error("corrupt row in '{table}': {message}")]
    Corrupt { table: &'static str, message: String },

    /// A schema value failed to parse while decoding a row.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Serialization of a structure snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
