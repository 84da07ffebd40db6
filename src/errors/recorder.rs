// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::errors::{GraphError, StorageError};

/// Errors that abandon the ingestion of a single event.
///
/// None of these escape [`crate::recorder::EventRecorder::record`]; they are
/// logged there and the recorder moves on to the next event.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("graph failure: {0}")]
    Graph(#[from] GraphError),

    /// The span ancestry of an event does not provide a required field
    #[error("event '{identifier}' has no {what} in its span ancestry")]
    MissingContext {
        identifier: String,
        what: &'static str,
    },

    #[error("failed to serialize workflow structure: {0}")]
    Serialization(#[from] serde_json::Error),
}
