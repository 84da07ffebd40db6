// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors for parsing schema value types from their text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid iteration vector '{input}': {reason}")]
    InvalidIteration { input: String, reason: String },

    #[error("Invalid port direction '{0}' (expected 'input' or 'output')")]
    InvalidDirection(String),

    #[error("Invalid value kind '{0}'")]
    InvalidValueKind(String),
}
